//! The save pipeline: tag, build, sort, write, patch, compress, finalise.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use ulink_object::{Guid, GraphError, NameId, ObjectFlags, ObjectGraph, ObjectHandle, PackageFlags};

use crate::archive::PayloadWriter;
use crate::compress::{compress_package, ZstdCodec};
use crate::config::LinkerConfig;
use crate::conform::{sort_exports, sort_imports, sort_names, validate_conform, ConformSource};
use crate::context::SaveContext;
use crate::cross_level::{scan_cross_level, CrossLevelTables};
use crate::error::{LinkError, LinkResult};
use crate::illegal::{diagnose, find_illegal_imports};
use crate::index::PackageIndex;
use crate::seek_free::seek_free_order;
use crate::summary::{package_source, GenerationInfo, PackageSummary};
use crate::tables::{
    build_exports, build_imports, resolve_import_outers, IndexMap, NameMap, ObjectExport,
    ObjectImport,
};
use crate::tagger::{clear_marks, tag_imports, tag_object_names, tag_package_exports};
use crate::thumbnails::encode_thumbnails;
use crate::wire::{len_u32, Encoder};

/// Step of the save pipeline a [`PackageWriter`] is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SavePhase {
    Init,
    TagExports,
    BuildNameTable,
    BuildImportTable,
    BuildExportTable,
    SortTables,
    ComputeDependsMap,
    WriteHeader,
    WriteNames,
    WriteTables,
    WriteDependsMap,
    WriteGuidTables,
    WriteThumbnails,
    WriteObjectData,
    RewriteTables,
    RewriteHeader,
    Compress,
    Finalize,
    Done,
}

/// What to save besides the package itself.
#[derive(Default)]
pub struct SaveOptions<'a> {
    /// Object the export walk starts from.
    pub base: Option<ObjectHandle>,
    /// Objects of the package carrying any of these flags are also roots.
    pub top_level_flags: ObjectFlags,
    /// Prior version of the package to keep table slots stable against.
    pub conform: Option<&'a mut dyn ConformSource>,
    /// Leave the package marked dirty after a successful save.
    pub keep_dirty: bool,
}

/// Summary of a finished save.
#[derive(Clone, Debug, Serialize)]
pub struct SaveReport {
    pub path: PathBuf,
    pub package: String,
    pub names: usize,
    pub imports: usize,
    pub exports: usize,
    /// Null import and export slots kept for a conformed layout.
    pub placeholders: usize,
    pub total_header_size: u32,
    pub file_size: u64,
    pub compressed: bool,
    pub guid: String,
}

/// Tables of one save, in final order.
struct LinkerTables {
    names: Vec<NameId>,
    imports: Vec<ObjectImport>,
    exports: Vec<ObjectExport>,
    depends: Vec<Vec<PackageIndex>>,
    cross_level: CrossLevelTables,
}

/// Writes packages through the two-pass placeholder-then-patch pipeline.
#[derive(Debug)]
pub struct PackageWriter {
    config: LinkerConfig,
    phase: SavePhase,
}

impl PackageWriter {
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            config,
            phase: SavePhase::Init,
        }
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Phase the last save reached; `Done` after a success.
    pub fn phase(&self) -> SavePhase {
        self.phase
    }

    fn enter(&mut self, phase: SavePhase) {
        debug!(?phase, "save phase");
        self.phase = phase;
    }

    /// Save `package` to `path`.
    ///
    /// Nothing at `path` changes unless the whole save succeeds: the package
    /// is written to a temporary file beside it and renamed into place.
    pub fn save(
        &mut self,
        ctx: &mut SaveContext,
        graph: &mut ObjectGraph,
        package: ObjectHandle,
        path: &Path,
        options: SaveOptions<'_>,
    ) -> LinkResult<SaveReport> {
        if !ctx.begin_save() {
            return Err(LinkError::RecursiveSave(graph.name(package).to_string()));
        }
        self.enter(SavePhase::Init);
        let result = self.save_package(ctx, graph, package, path, options);
        ctx.end_save();
        if let Err(err) = &result {
            warn!(package = %graph.name(package), phase = ?self.phase, "save failed: {err}");
        }
        result
    }

    fn save_package(
        &mut self,
        ctx: &mut SaveContext,
        graph: &mut ObjectGraph,
        package: ObjectHandle,
        path: &Path,
        options: SaveOptions<'_>,
    ) -> LinkResult<SaveReport> {
        let SaveOptions {
            base,
            top_level_flags,
            mut conform,
            keep_dirty,
        } = options;

        let package_name = graph.name(package).to_string();
        let data = graph
            .package_data(package)
            .ok_or_else(|| GraphError::NotAPackage(package_name.clone()))?
            .clone();
        if data.flags.contains(PackageFlags::SAVED_WITH_NEWER_VERSION) {
            return Err(LinkError::VersionIncompatible(package_name));
        }
        if !data.fully_loaded && base.is_none() {
            return Err(LinkError::PartiallyLoadedSource(package_name));
        }
        if let Some(source) = conform.as_deref_mut() {
            validate_conform(graph, package, source)?;
        }

        // Tagging
        self.enter(SavePhase::TagExports);
        clear_marks(graph, ctx, package);
        let roots = tag_package_exports(graph, ctx, package, base, top_level_flags)?;
        let cross_level = scan_cross_level(graph, ctx, package);
        let dependencies = tag_imports(graph, ctx);
        tag_object_names(graph, ctx);
        if let Some((reason, bad)) = find_illegal_imports(graph, ctx, package) {
            return Err(diagnose(graph, ctx, &roots, reason, &bad).into());
        }

        // Tables
        self.enter(SavePhase::BuildNameTable);
        let names = sort_names(graph, ctx, conform.as_deref());
        self.enter(SavePhase::BuildImportTable);
        let imports = build_imports(graph, ctx);
        self.enter(SavePhase::BuildExportTable);
        let exports = build_exports(graph, ctx);

        self.enter(SavePhase::SortTables);
        let imports = sort_imports(graph, imports, conform.as_deref());
        let (mut exports, first_sort_index) =
            sort_exports(graph, package, exports, conform.as_deref());
        if self.config.seek_free_sort {
            exports = seek_free_order(graph, exports, first_sort_index, self.config.verify_sort)?;
        }

        self.enter(SavePhase::ComputeDependsMap);
        let indices = IndexMap::new(&imports, &exports);
        let depends = depends_map(graph, &exports, &dependencies, &indices)?;

        let mut summary = self.initial_summary(graph, package, conform.as_deref())?;
        let mut tables = LinkerTables {
            names,
            imports,
            exports,
            depends,
            cross_level,
        };

        // Uncompressed image
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| package_name.clone());
        let mut temp = create_temp_file(dir, &file_name, &self.config.temp_suffix)?;
        self.write_image(ctx, graph, package, &mut summary, &mut tables, &indices, &mut temp)?;

        let compress = summary.flags().contains(PackageFlags::STORE_COMPRESSED)
            || self.config.force_compression;
        let temp = if compress {
            self.enter(SavePhase::Compress);
            let mut image = Vec::new();
            temp.as_file_mut().seek(SeekFrom::Start(0))?;
            temp.as_file_mut().read_to_end(&mut image)?;
            let sizes: Vec<u32> = tables.exports.iter().map(|e| e.serial_size).collect();

            let compressed_name = format!("{file_name}_compressed");
            let mut target = create_temp_file(dir, &compressed_name, &self.config.temp_suffix)?;
            let codec = ZstdCodec::new(self.config.compression_level);
            summary = compress_package(
                &image,
                &sizes,
                &codec,
                self.config.max_chunk_size,
                &mut target,
            )?;
            target
        } else {
            temp
        };

        self.enter(SavePhase::Finalize);
        temp.as_file().sync_all()?;
        let file_size = temp.as_file().metadata()?.len();
        temp.persist(path).map_err(|e| LinkError::Io(e.error))?;
        info!(
            package = %package_name,
            path = %path.display(),
            bytes = file_size,
            compressed = compress,
            "saved package"
        );

        ctx.apply_to_graph(graph);
        let cooked = data.flags.contains(PackageFlags::COOKED);
        let conformed = conform.is_some();
        if let Some(data) = graph.package_data_mut(package) {
            if !conformed && !cooked {
                data.guid = summary.guid;
            }
            if summary.flags().contains(PackageFlags::SERVER_SIDE_ONLY) {
                data.flags.insert(PackageFlags::SERVER_SIDE_ONLY);
            } else {
                data.generation_net_object_counts =
                    summary.generations.iter().map(|g| g.net_object_count).collect();
            }
            data.import_guids = tables.cross_level.import_guids.clone();
            data.export_guids = tables.cross_level.export_guids.clone();
            if !keep_dirty {
                data.dirty = false;
            }
        }
        self.enter(SavePhase::Done);

        let placeholders = tables.imports.iter().filter(|i| i.object.is_none()).count()
            + tables.exports.iter().filter(|e| e.object.is_none()).count();
        Ok(SaveReport {
            path: path.to_path_buf(),
            package: package_name,
            names: tables.names.len(),
            imports: tables.imports.len(),
            exports: tables.exports.len(),
            placeholders,
            total_header_size: summary.total_header_size,
            file_size,
            compressed: compress,
            guid: summary.guid.to_hex(),
        })
    }

    /// Summary with the fields known before writing: identity, flags, and a
    /// generation list whose last entry is filled in by the header rewrite.
    fn initial_summary(
        &self,
        graph: &ObjectGraph,
        package: ObjectHandle,
        conform: Option<&dyn ConformSource>,
    ) -> LinkResult<PackageSummary> {
        let data = graph
            .package_data(package)
            .ok_or_else(|| GraphError::NotAPackage(graph.name(package).to_string()))?;
        let mut summary = PackageSummary::new(self.config.engine_version);
        summary.folder_name = data.folder_name.clone();
        summary.package_flags = data.flags.bits();

        match conform {
            Some(source) => {
                debug!(
                    source = source.source_name(),
                    generation = source.generations().len() + 1,
                    "conformal save"
                );
                summary.guid = source.guid();
                summary.generations = source.generations().to_vec();
            }
            None if data.flags.contains(PackageFlags::COOKED) => {
                // Cooked packages keep the guid and generations forced-export
                // copies in other packages were built against.
                summary.guid = data.guid;
                if !data.flags.contains(PackageFlags::SERVER_SIDE_ONLY) {
                    let counts = &data.generation_net_object_counts;
                    if let Some((_, earlier)) = counts.split_last() {
                        summary.generations = earlier
                            .iter()
                            .map(|&net_object_count| GenerationInfo {
                                net_object_count,
                                ..Default::default()
                            })
                            .collect();
                    }
                }
            }
            None => summary.guid = Guid::new(),
        }
        summary.generations.push(GenerationInfo::default());
        summary.package_source = package_source(graph.name(package));
        Ok(summary)
    }

    /// Write the uncompressed package into `out` and patch its tables and
    /// summary in place.
    #[allow(clippy::too_many_arguments)]
    fn write_image<W: Write + Seek>(
        &mut self,
        ctx: &mut SaveContext,
        graph: &ObjectGraph,
        package: ObjectHandle,
        summary: &mut PackageSummary,
        tables: &mut LinkerTables,
        indices: &IndexMap,
        out: &mut W,
    ) -> LinkResult<()> {
        let name_map = NameMap::new(&tables.names);

        self.enter(SavePhase::WriteHeader);
        let placeholder = summary.to_bytes();
        out.write_all(&placeholder)?;

        self.enter(SavePhase::WriteNames);
        summary.name_count = len_u32(tables.names.len(), "name table")?;
        summary.name_offset = position(out)?;
        let mut enc = Encoder::new();
        for &name in &tables.names {
            enc.str(graph.names().resolve(name))
                .u64(ctx.name_flags(name).bits());
        }
        out.write_all(&enc.into_bytes())?;

        self.enter(SavePhase::WriteTables);
        summary.import_count = len_u32(tables.imports.len(), "import table")?;
        summary.import_offset = position(out)?;
        out.write_all(&encode_imports(&tables.imports, &name_map)?)?;
        summary.export_count = len_u32(tables.exports.len(), "export table")?;
        summary.export_offset = position(out)?;
        out.write_all(&encode_exports(&tables.exports, &name_map)?)?;

        self.enter(SavePhase::WriteDependsMap);
        summary.depends_offset = position(out)?;
        let mut enc = Encoder::new();
        for list in &tables.depends {
            enc.count(list.len(), "depends list")?;
            for index in list {
                enc.index(*index);
            }
        }
        out.write_all(&enc.into_bytes())?;

        self.enter(SavePhase::WriteGuidTables);
        summary.import_export_guids_offset = position(out)?;
        let mut enc = Encoder::new();
        for level in &tables.cross_level.import_guids {
            enc.str(&level.level_name).count(level.guids.len(), "level guids")?;
            for guid in &level.guids {
                enc.guid(guid);
            }
        }
        let mut export_guids = 0u32;
        for (guid, object) in &tables.cross_level.export_guids {
            let index = indices.get(*object);
            if !index.is_export() {
                warn!(object = %graph.full_name(*object), "cross-level export guid for an object that is not exported");
                continue;
            }
            enc.guid(guid).index(index);
            export_guids += 1;
        }
        summary.import_guids_count = len_u32(tables.cross_level.import_guids.len(), "import guids")?;
        summary.export_guids_count = export_guids;
        out.write_all(&enc.into_bytes())?;

        self.enter(SavePhase::WriteThumbnails);
        let start = position(out)?;
        summary.thumbnail_table_offset = match encode_thumbnails(graph, ctx, package, start)? {
            Some((bytes, toc_offset)) => {
                out.write_all(&bytes)?;
                toc_offset
            }
            None => 0,
        };

        self.enter(SavePhase::WriteObjectData);
        summary.total_header_size = position(out)?;
        for export in tables.exports.iter_mut() {
            let Some(object) = export.object else {
                continue;
            };
            export.resolve_indices(graph, package, indices);
            let payload = PayloadWriter::new(graph, &name_map, indices).write(object)?;
            export.serial_offset = position(out)?;
            export.serial_size = len_u32(payload.len(), "export payload")?;
            out.write_all(&payload)?;
            ctx.marks_mut(object).saved = true;
        }
        debug!(
            exports = tables.exports.len(),
            bytes = position(out)? - summary.total_header_size,
            "wrote export payloads"
        );

        self.enter(SavePhase::RewriteTables);
        resolve_import_outers(graph, package, &mut tables.imports, indices);
        out.seek(SeekFrom::Start(summary.import_offset as u64))?;
        out.write_all(&encode_imports(&tables.imports, &name_map)?)?;
        out.seek(SeekFrom::Start(summary.export_offset as u64))?;
        out.write_all(&encode_exports(&tables.exports, &name_map)?)?;

        self.enter(SavePhase::RewriteHeader);
        finish_generation(summary, graph, package, &tables.exports);
        let header = summary.to_bytes();
        if header.len() != placeholder.len() {
            return Err(LinkError::Corrupt {
                offset: 0,
                reason: format!(
                    "summary grew from {} to {} bytes",
                    placeholder.len(),
                    header.len()
                ),
            });
        }
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header)?;
        out.seek(SeekFrom::End(0))?;
        out.flush()?;
        Ok(())
    }
}

/// Fill in the counts of the generation being written.
fn finish_generation(
    summary: &mut PackageSummary,
    graph: &ObjectGraph,
    package: ObjectHandle,
    exports: &[ObjectExport],
) {
    let export_count = summary.export_count;
    let name_count = summary.name_count;
    let counts = graph
        .package_data(package)
        .map(|data| data.generation_net_object_counts.clone())
        .unwrap_or_default();

    let mut flags = summary.flags();
    let net_object_count = if flags.contains(PackageFlags::COOKED) {
        match counts.last() {
            Some(&count) => count,
            None => {
                if !flags.contains(PackageFlags::SERVER_SIDE_ONLY) {
                    warn!(
                        package = %graph.name(package),
                        "cooked replicated package has no net object counts, forcing server side only"
                    );
                    flags.insert(PackageFlags::SERVER_SIDE_ONLY);
                    summary.package_flags = flags.bits();
                }
                0
            }
        }
    } else {
        export_count
    };

    if let Some(last) = summary.generations.last_mut() {
        *last = GenerationInfo {
            export_count,
            name_count,
            net_object_count,
        };
    }
    debug!(
        exports = exports.len(),
        generations = summary.generations.len(),
        "finished generation"
    );
}

/// Dependency list of every export slot as package indices.
fn depends_map(
    graph: &ObjectGraph,
    exports: &[ObjectExport],
    dependencies: &HashMap<ObjectHandle, Vec<ObjectHandle>>,
    indices: &IndexMap,
) -> LinkResult<Vec<Vec<PackageIndex>>> {
    let mut depends = Vec::with_capacity(exports.len());
    for export in exports {
        let Some(object) = export.object else {
            depends.push(Vec::new());
            continue;
        };
        let mut list = Vec::new();
        for &dependency in dependencies.get(&object).map(Vec::as_slice).unwrap_or_default() {
            let index = indices.get(dependency);
            if index.is_null() {
                return Err(LinkError::UnresolvedDependency {
                    object: graph.full_name(object),
                    dependency: graph.full_name(dependency),
                });
            }
            list.push(index);
        }
        depends.push(list);
    }
    Ok(depends)
}

fn encode_imports(imports: &[ObjectImport], names: &NameMap) -> LinkResult<Vec<u8>> {
    let mut enc = Encoder::new();
    for import in imports {
        import.encode(names, &mut enc)?;
    }
    Ok(enc.into_bytes())
}

fn encode_exports(exports: &[ObjectExport], names: &NameMap) -> LinkResult<Vec<u8>> {
    let mut enc = Encoder::new();
    for export in exports {
        export.encode(names, &mut enc)?;
    }
    Ok(enc.into_bytes())
}

fn position<S: Seek>(stream: &mut S) -> LinkResult<u32> {
    let offset = stream.stream_position()?;
    u32::try_from(offset).map_err(|_| LinkError::Corrupt {
        offset,
        reason: "package exceeds 4 GiB".into(),
    })
}

/// Temporary file `<prefix><suffix>` in `dir`, replacing a stale one left by
/// an earlier failed save.
fn create_temp_file(dir: &Path, prefix: &str, suffix: &str) -> LinkResult<NamedTempFile> {
    let stale = dir.join(format!("{prefix}{suffix}"));
    if stale.exists() {
        debug!(path = %stale.display(), "removing stale temporary file");
        fs::remove_file(&stale)?;
    }
    let file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .rand_bytes(0)
        .tempfile_in(dir)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulink_object::{ClassFlags, PropertyValue};

    fn sample() -> (ObjectGraph, ObjectHandle, ObjectHandle) {
        let mut graph = ObjectGraph::new();
        let pkg = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let class = graph.create_class(pkg, "Thing", Some(object), ClassFlags::empty()).unwrap();
        let root = graph
            .create_object(class, pkg, "Root", ObjectFlags::PUBLIC | ObjectFlags::STANDALONE)
            .unwrap();
        graph.set_property(root, "Count", PropertyValue::Int(3)).unwrap();
        (graph, pkg, root)
    }

    fn options<'a>(root: ObjectHandle) -> SaveOptions<'a> {
        SaveOptions {
            base: Some(root),
            top_level_flags: ObjectFlags::STANDALONE,
            ..Default::default()
        }
    }

    #[test]
    fn save_reaches_done_and_clears_dirty() {
        let (mut graph, pkg, root) = sample();
        graph.package_data_mut(pkg).unwrap().dirty = true;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");

        let mut writer = PackageWriter::new(LinkerConfig::default());
        let mut ctx = SaveContext::new();
        let report = writer.save(&mut ctx, &mut graph, pkg, &path, options(root)).unwrap();

        assert_eq!(writer.phase(), SavePhase::Done);
        assert!(!ctx.is_saving());
        assert!(!graph.package_data(pkg).unwrap().dirty);
        assert_eq!(report.file_size, fs::metadata(&path).unwrap().len());
        assert!(report.exports >= 3);
        assert_eq!(report.placeholders, 0);
        assert!(!dir.path().join("Game.upk_save.tmp").exists());
    }

    #[test]
    fn keep_dirty_leaves_the_flag() {
        let (mut graph, pkg, root) = sample();
        graph.package_data_mut(pkg).unwrap().dirty = true;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");

        let mut opts = options(root);
        opts.keep_dirty = true;
        PackageWriter::new(LinkerConfig::default())
            .save(&mut SaveContext::new(), &mut graph, pkg, &path, opts)
            .unwrap();
        assert!(graph.package_data(pkg).unwrap().dirty);
    }

    #[test]
    fn new_guid_is_stored_on_the_package() {
        let (mut graph, pkg, root) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");
        let report = PackageWriter::new(LinkerConfig::default())
            .save(&mut SaveContext::new(), &mut graph, pkg, &path, options(root))
            .unwrap();
        let data = graph.package_data(pkg).unwrap();
        assert_eq!(data.guid.to_hex(), report.guid);
        assert_eq!(data.generation_net_object_counts, vec![report.exports as u32]);
    }

    #[test]
    fn newer_version_is_rejected() {
        let (mut graph, pkg, root) = sample();
        graph
            .package_data_mut(pkg)
            .unwrap()
            .flags
            .insert(PackageFlags::SAVED_WITH_NEWER_VERSION);
        let dir = tempfile::tempdir().unwrap();
        let err = PackageWriter::new(LinkerConfig::default())
            .save(&mut SaveContext::new(), &mut graph, pkg, &dir.path().join("Game.upk"), options(root))
            .unwrap_err();
        assert!(matches!(err, LinkError::VersionIncompatible(name) if name == "Game"));
    }

    #[test]
    fn partially_loaded_package_needs_a_base() {
        let (mut graph, pkg, _) = sample();
        graph.package_data_mut(pkg).unwrap().fully_loaded = false;
        let dir = tempfile::tempdir().unwrap();
        let opts = SaveOptions {
            top_level_flags: ObjectFlags::STANDALONE,
            ..Default::default()
        };
        let err = PackageWriter::new(LinkerConfig::default())
            .save(&mut SaveContext::new(), &mut graph, pkg, &dir.path().join("Game.upk"), opts)
            .unwrap_err();
        assert!(matches!(err, LinkError::PartiallyLoadedSource(_)));
    }

    #[test]
    fn failed_rename_leaves_no_temp_files() {
        for force_compression in [false, true] {
            let (mut graph, pkg, root) = sample();
            graph.package_data_mut(pkg).unwrap().dirty = true;
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("Game.upk");
            fs::create_dir(&path).unwrap();

            let config = LinkerConfig {
                force_compression,
                ..Default::default()
            };
            let mut ctx = SaveContext::new();
            let err = PackageWriter::new(config)
                .save(&mut ctx, &mut graph, pkg, &path, options(root))
                .unwrap_err();
            assert!(matches!(err, LinkError::Io(_)), "unexpected error {err}");

            let left: Vec<String> = fs::read_dir(dir.path())
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            assert_eq!(left, vec!["Game.upk".to_string()], "compressed: {force_compression}");
            assert!(fs::read_dir(&path).unwrap().next().is_none());
            assert!(graph.package_data(pkg).unwrap().dirty);
            assert!(!ctx.is_saving());
        }
    }

    #[test]
    fn archetype_cycle_aborts_before_writing() {
        let (mut graph, pkg, root) = sample();
        let class = graph.class_of(root);
        let inner = graph.create_object(class, root, "Inner", ObjectFlags::PUBLIC).unwrap();
        graph.set_archetype(root, Some(inner)).unwrap();
        graph.set_archetype(inner, Some(root)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");

        let mut writer = PackageWriter::new(LinkerConfig::default());
        let err = writer
            .save(&mut SaveContext::new(), &mut graph, pkg, &path, options(root))
            .unwrap_err();
        assert!(matches!(err, LinkError::ForceLoadCycle { .. }), "unexpected error {err}");
        assert_eq!(writer.phase(), SavePhase::SortTables);
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn stale_temp_file_is_replaced() {
        let (mut graph, pkg, root) = sample();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Game.upk_save.tmp"), b"stale").unwrap();
        let path = dir.path().join("Game.upk");
        PackageWriter::new(LinkerConfig::default())
            .save(&mut SaveContext::new(), &mut graph, pkg, &path, options(root))
            .unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("Game.upk_save.tmp").exists());
    }

    #[test]
    fn summary_offsets_are_in_layout_order() {
        let (mut graph, pkg, root) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");
        PackageWriter::new(LinkerConfig::default())
            .save(&mut SaveContext::new(), &mut graph, pkg, &path, options(root))
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        let (summary, len) = PackageSummary::from_bytes(&bytes).unwrap();
        assert_eq!(summary.name_offset as usize, len);
        assert!(summary.name_offset < summary.import_offset);
        assert!(summary.import_offset < summary.export_offset);
        assert!(summary.export_offset < summary.depends_offset);
        assert!(summary.depends_offset <= summary.import_export_guids_offset);
        assert!(summary.import_export_guids_offset <= summary.total_header_size);
        assert_eq!(summary.thumbnail_table_offset, 0);
        assert_eq!(summary.package_source, package_source("Game"));
        assert_eq!(summary.generations.len(), 1);
        assert_eq!(summary.generations[0].export_count, summary.export_count);
    }
}
