//! Parsing saved packages back into their tables.

use std::path::Path;

use serde::Serialize;
use tracing::debug;
use ulink_object::{Guid, LevelGuids, ObjectFlags, PackageFlags};

use crate::compress::decompress_package;
use crate::conform::{
    ConformSource, ReplicatedField, ReplicatedFieldKind, ReplicationLayout,
};
use crate::error::{LinkError, LinkResult};
use crate::index::PackageIndex;
use crate::summary::{GenerationInfo, PackageSummary};
use crate::thumbnails::{decode_thumbnail, decode_thumbnail_table, ThumbnailEntry};
use crate::wire::Decoder;

/// One name table entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NameEntry {
    pub name: String,
    /// Load contexts the name is needed in.
    pub flags: ObjectFlags,
}

/// An import as stored on disk, with names resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportEntry {
    pub class_package: String,
    pub class_name: String,
    pub outer_index: PackageIndex,
    pub object_name: String,
}

/// An export as stored on disk, with its name resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    pub class_index: PackageIndex,
    pub super_index: PackageIndex,
    pub outer_index: PackageIndex,
    pub object_name: String,
    pub archetype_index: PackageIndex,
    pub object_flags: ObjectFlags,
    pub serial_size: u32,
    pub serial_offset: u32,
    pub export_flags: u32,
    pub package_guid: Guid,
    pub package_flags: PackageFlags,
    pub generation_net_object_counts: Vec<u32>,
}

/// A parsed package: summary, tables and (until released) payload bytes.
#[derive(Debug)]
pub struct PackageReader {
    source: String,
    /// Name the package's exports are rooted at.
    root_name: String,
    summary: PackageSummary,
    file_summary: PackageSummary,
    image: Vec<u8>,
    names: Vec<String>,
    name_flags: Vec<ObjectFlags>,
    imports: Vec<ImportEntry>,
    exports: Vec<ExportEntry>,
    depends: Vec<Vec<PackageIndex>>,
    import_guids: Vec<LevelGuids>,
    export_guids: Vec<(Guid, PackageIndex)>,
    thumbnails: Vec<ThumbnailEntry>,
}

impl PackageReader {
    /// Read a package file. The root name is the file stem.
    pub fn open(path: &Path) -> LinkResult<Self> {
        let bytes = std::fs::read(path)?;
        let root_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut reader = Self::from_bytes(&root_name, &bytes)?;
        reader.source = path.display().to_string();
        Ok(reader)
    }

    /// Parse a package image, decompressing it first if it is chunked.
    pub fn from_bytes(root_name: &str, bytes: &[u8]) -> LinkResult<Self> {
        let (file_summary, _) = PackageSummary::from_bytes(bytes)?;
        let image = decompress_package(bytes)?;
        let (summary, _) = PackageSummary::from_bytes(&image)?;

        let mut reader = Self {
            source: root_name.to_string(),
            root_name: root_name.to_string(),
            summary,
            file_summary,
            image,
            names: Vec::new(),
            name_flags: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            depends: Vec::new(),
            import_guids: Vec::new(),
            export_guids: Vec::new(),
            thumbnails: Vec::new(),
        };
        reader.read_names()?;
        reader.read_imports()?;
        reader.read_exports()?;
        reader.read_depends()?;
        reader.read_guid_tables()?;
        if reader.summary.thumbnail_table_offset != 0 {
            reader.thumbnails =
                decode_thumbnail_table(&reader.image, reader.summary.thumbnail_table_offset)?;
        }
        debug!(
            package = %reader.root_name,
            names = reader.names.len(),
            imports = reader.imports.len(),
            exports = reader.exports.len(),
            "read package"
        );
        Ok(reader)
    }

    fn read_names(&mut self) -> LinkResult<()> {
        let mut dec = Decoder::at(&self.image, self.summary.name_offset)?;
        for _ in 0..self.summary.name_count {
            self.names.push(dec.str()?);
            self.name_flags.push(ObjectFlags::from_bits(dec.u64()?));
        }
        Ok(())
    }

    fn name_at(&self, slot: u32, offset: usize) -> LinkResult<String> {
        self.names
            .get(slot as usize)
            .cloned()
            .ok_or_else(|| LinkError::Corrupt {
                offset: offset as u64,
                reason: format!("name index {slot} out of range"),
            })
    }

    fn read_imports(&mut self) -> LinkResult<()> {
        let mut dec = Decoder::at(&self.image, self.summary.import_offset)?;
        for _ in 0..self.summary.import_count {
            let offset = dec.position();
            let class_package = dec.u32()?;
            let class_name = dec.u32()?;
            let outer_index = dec.index()?;
            let object_name = dec.u32()?;
            let import = ImportEntry {
                class_package: self.name_at(class_package, offset)?,
                class_name: self.name_at(class_name, offset)?,
                outer_index,
                object_name: self.name_at(object_name, offset)?,
            };
            self.imports.push(import);
        }
        Ok(())
    }

    fn read_exports(&mut self) -> LinkResult<()> {
        let mut dec = Decoder::at(&self.image, self.summary.export_offset)?;
        for _ in 0..self.summary.export_count {
            let offset = dec.position();
            let class_index = dec.index()?;
            let super_index = dec.index()?;
            let outer_index = dec.index()?;
            let object_name = dec.u32()?;
            let archetype_index = dec.index()?;
            let object_flags = ObjectFlags::from_bits(dec.u64()?);
            let serial_size = dec.u32()?;
            let serial_offset = dec.u32()?;
            let export_flags = dec.u32()?;
            let package_guid = dec.guid()?;
            let package_flags = PackageFlags::from_bits(dec.u32()?);
            let counts = dec.count(4, "net object count")?;
            let mut generation_net_object_counts = Vec::with_capacity(counts);
            for _ in 0..counts {
                generation_net_object_counts.push(dec.u32()?);
            }
            let export = ExportEntry {
                class_index,
                super_index,
                outer_index,
                object_name: self.name_at(object_name, offset)?,
                archetype_index,
                object_flags,
                serial_size,
                serial_offset,
                export_flags,
                package_guid,
                package_flags,
                generation_net_object_counts,
            };
            self.exports.push(export);
        }
        Ok(())
    }

    fn read_depends(&mut self) -> LinkResult<()> {
        let mut dec = Decoder::at(&self.image, self.summary.depends_offset)?;
        for _ in 0..self.summary.export_count {
            let count = dec.count(4, "dependency")?;
            let mut list = Vec::with_capacity(count);
            for _ in 0..count {
                list.push(dec.index()?);
            }
            self.depends.push(list);
        }
        Ok(())
    }

    fn read_guid_tables(&mut self) -> LinkResult<()> {
        let mut dec = Decoder::at(&self.image, self.summary.import_export_guids_offset)?;
        for _ in 0..self.summary.import_guids_count {
            let level_name = dec.str()?;
            let count = dec.count(16, "import guid")?;
            let mut guids = Vec::with_capacity(count);
            for _ in 0..count {
                guids.push(dec.guid()?);
            }
            self.import_guids.push(LevelGuids { level_name, guids });
        }
        for _ in 0..self.summary.export_guids_count {
            let guid = dec.guid()?;
            self.export_guids.push((guid, dec.index()?));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Summary of the uncompressed image.
    pub fn summary(&self) -> &PackageSummary {
        &self.summary
    }

    /// Summary as stored in the file, including the chunk table.
    pub fn file_summary(&self) -> &PackageSummary {
        &self.file_summary
    }

    pub fn name_entries(&self) -> Vec<NameEntry> {
        self.names
            .iter()
            .zip(&self.name_flags)
            .map(|(name, flags)| NameEntry {
                name: name.clone(),
                flags: *flags,
            })
            .collect()
    }

    pub fn imports(&self) -> &[ImportEntry] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportEntry] {
        &self.exports
    }

    /// Dependency list of each export slot.
    pub fn depends(&self) -> &[Vec<PackageIndex>] {
        &self.depends
    }

    pub fn import_guids(&self) -> &[LevelGuids] {
        &self.import_guids
    }

    pub fn export_guids(&self) -> &[(Guid, PackageIndex)] {
        &self.export_guids
    }

    pub fn thumbnails(&self) -> &[ThumbnailEntry] {
        &self.thumbnails
    }

    /// Whether payload bytes have been dropped by
    /// [`release_unreferenced`](ConformSource::release_unreferenced).
    pub fn is_released(&self) -> bool {
        self.image.is_empty()
    }

    /// Payload bytes of export slot `export`.
    pub fn payload(&self, export: usize) -> Option<&[u8]> {
        let entry = self.exports.get(export)?;
        let start = entry.serial_offset as usize;
        self.image.get(start..start + entry.serial_size as usize)
    }

    /// Width, height and image bytes of a thumbnail listed in the table.
    pub fn thumbnail(&self, entry: &ThumbnailEntry) -> LinkResult<(u32, u32, Vec<u8>)> {
        decode_thumbnail(&self.image, entry.offset)
    }

    /// Object name at `index`, `"None"` for null.
    pub fn object_name(&self, index: PackageIndex) -> &str {
        if let Some(i) = index.export_index() {
            return self.exports.get(i).map_or("None", |e| e.object_name.as_str());
        }
        if let Some(i) = index.import_index() {
            return self.imports.get(i).map_or("None", |e| e.object_name.as_str());
        }
        "None"
    }

    /// Class name of export slot `export`.
    pub fn export_class_name(&self, export: usize) -> &str {
        match self.exports.get(export) {
            Some(entry) if entry.class_index.is_null() => "Class",
            Some(entry) => self.object_name(entry.class_index),
            None => "None",
        }
    }

    /// Dotted path of the object at `index` through its outer chain.
    /// Exports are rooted at `root`.
    pub fn object_path(&self, index: PackageIndex, root: &str) -> String {
        let mut parts = Vec::new();
        let mut current = index;
        let mut in_exports = false;
        // Bounded by the table sizes, a corrupt outer cycle stops there.
        for _ in 0..=(self.imports.len() + self.exports.len()) {
            let outer = if let Some(i) = current.export_index() {
                in_exports = true;
                self.exports.get(i).map(|e| (e.object_name.as_str(), e.outer_index))
            } else if let Some(i) = current.import_index() {
                self.imports.get(i).map(|e| (e.object_name.as_str(), e.outer_index))
            } else {
                None
            };
            let Some((name, outer)) = outer else {
                break;
            };
            parts.push(name);
            current = outer;
        }
        if in_exports && current.is_null() {
            parts.push(root);
        }
        parts.reverse();
        parts.join(".")
    }

    pub fn import_full_name(&self, import: usize) -> String {
        let class = self.imports.get(import).map_or("None", |i| i.class_name.as_str());
        format!(
            "{class} {}",
            self.object_path(PackageIndex::from_import(import), &self.root_name)
        )
    }

    pub fn export_full_name(&self, export: usize, root: &str) -> String {
        format!(
            "{} {}",
            self.export_class_name(export),
            self.object_path(PackageIndex::from_export(export), root)
        )
    }

    fn field_kind(class_name: &str) -> Option<ReplicatedFieldKind> {
        if class_name == "Function" {
            Some(ReplicatedFieldKind::Function)
        } else if class_name.ends_with("Property") {
            Some(ReplicatedFieldKind::Property)
        } else {
            None
        }
    }
}

impl ConformSource for PackageReader {
    fn source_name(&self) -> &str {
        &self.source
    }

    fn guid(&self) -> Guid {
        self.summary.guid
    }

    fn package_flags(&self) -> PackageFlags {
        self.summary.flags()
    }

    fn generations(&self) -> &[GenerationInfo] {
        &self.summary.generations
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn import_full_names(&self) -> Vec<String> {
        (0..self.imports.len()).map(|i| self.import_full_name(i)).collect()
    }

    fn export_full_names(&self, root_name: &str) -> Vec<String> {
        (0..self.exports.len())
            .map(|i| self.export_full_name(i, root_name))
            .collect()
    }

    /// Direct property and function children of every class export, with
    /// the field flags that lead their payloads.
    fn replication_layouts(&self) -> Vec<ReplicationLayout> {
        let mut layouts = Vec::new();
        for (slot, class) in self.exports.iter().enumerate() {
            if !class.class_index.is_null() {
                continue;
            }
            let class_index = PackageIndex::from_export(slot);
            let mut fields = Vec::new();
            for (child_slot, child) in self.exports.iter().enumerate() {
                if child.outer_index != class_index {
                    continue;
                }
                let Some(kind) = Self::field_kind(self.export_class_name(child_slot)) else {
                    continue;
                };
                let Some(flags) = self
                    .payload(child_slot)
                    .and_then(|p| p.get(..8))
                    .and_then(|b| b.try_into().ok())
                    .map(u64::from_be_bytes)
                else {
                    continue;
                };
                fields.push(ReplicatedField {
                    name: child.object_name.clone(),
                    kind,
                    flags,
                });
            }
            if !fields.is_empty() {
                layouts.push(ReplicationLayout {
                    class_name: class.object_name.clone(),
                    fields,
                });
            }
        }
        layouts
    }

    fn release_unreferenced(&mut self) {
        debug!(source = %self.source, bytes = self.image.len(), "releasing payload bytes");
        self.image = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkerConfig;
    use crate::context::SaveContext;
    use crate::writer::{PackageWriter, SaveOptions};
    use ulink_object::{
        ClassFlags, FunctionFlags, ObjectGraph, ObjectHandle, PropertyFlags, PropertyType,
        PropertyValue,
    };

    fn saved_game(config: LinkerConfig) -> (ObjectGraph, ObjectHandle, tempfile::TempDir, PackageReader) {
        let mut graph = ObjectGraph::new();
        let pkg = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let pawn = graph.create_class(pkg, "Pawn", Some(object), ClassFlags::empty()).unwrap();
        graph
            .add_property(pawn, "Health", PropertyType::Int, PropertyFlags::NET)
            .unwrap();
        graph
            .create_function(pawn, "ServerMove", FunctionFlags::NET | FunctionFlags::NET_SERVER)
            .unwrap();
        let hero = graph
            .create_object(pawn, pkg, "Hero", ObjectFlags::PUBLIC | ObjectFlags::STANDALONE)
            .unwrap();
        graph.set_property(hero, "Health", PropertyValue::Int(100)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");
        let options = SaveOptions {
            base: Some(hero),
            top_level_flags: ObjectFlags::STANDALONE,
            ..Default::default()
        };
        PackageWriter::new(config)
            .save(&mut SaveContext::new(), &mut graph, pkg, &path, options)
            .unwrap();
        let reader = PackageReader::open(&path).unwrap();
        (graph, pkg, dir, reader)
    }

    #[test]
    fn tables_match_the_graph() {
        let (graph, pkg, _dir, reader) = saved_game(LinkerConfig::default());
        assert_eq!(reader.root_name(), "Game");
        assert_eq!(reader.names()[0], "None");

        let hero = graph.find_object(Some(pkg), "Hero").unwrap();
        let full = export_full_name_of(&reader, "Pawn Game.Hero");
        assert!(full.is_some(), "missing {}", graph.full_name(hero));
        assert!(reader
            .import_full_names()
            .contains(&"Class Core.Object".to_string()));
        assert!(reader
            .import_full_names()
            .contains(&"Package Core".to_string()));
        assert_eq!(reader.depends().len(), reader.exports().len());
    }

    fn export_full_name_of(reader: &PackageReader, wanted: &str) -> Option<usize> {
        reader
            .export_full_names("Game")
            .iter()
            .position(|name| name == wanted)
    }

    #[test]
    fn payload_offsets_start_after_the_header() {
        let (_, _, _dir, reader) = saved_game(LinkerConfig::default());
        let header = reader.summary().total_header_size;
        for (slot, export) in reader.exports().iter().enumerate() {
            assert!(export.serial_offset >= header);
            assert_eq!(reader.payload(slot).unwrap().len(), export.serial_size as usize);
        }
    }

    #[test]
    fn replication_layouts_come_from_field_payloads() {
        let (_, _, _dir, reader) = saved_game(LinkerConfig::default());
        let layouts = reader.replication_layouts();
        let pawn = layouts.iter().find(|l| l.class_name == "Pawn").unwrap();
        let health = pawn.fields.iter().find(|f| f.name == "Health").unwrap();
        assert_eq!(health.kind, ReplicatedFieldKind::Property);
        assert_ne!(health.flags & PropertyFlags::NET.bits(), 0);
        let server_move = pawn.fields.iter().find(|f| f.name == "ServerMove").unwrap();
        assert_eq!(server_move.kind, ReplicatedFieldKind::Function);
        assert_ne!(server_move.flags & FunctionFlags::NET_SERVER.bits(), 0);
    }

    #[test]
    fn compressed_packages_read_transparently() {
        let config = LinkerConfig {
            force_compression: true,
            max_chunk_size: 64,
            ..Default::default()
        };
        let (_, _, _dir, reader) = saved_game(config);
        assert!(reader.file_summary().is_compressed());
        assert!(!reader.summary().is_compressed());
        assert!(reader.exports().iter().any(|e| e.object_name == "Hero"));
    }

    #[test]
    fn release_drops_payloads_but_keeps_tables() {
        let (_, _, _dir, mut reader) = saved_game(LinkerConfig::default());
        let exports = reader.export_full_names("Game");
        reader.release_unreferenced();
        assert!(reader.is_released());
        assert!(reader.payload(0).is_none());
        assert_eq!(reader.export_full_names("Game"), exports);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = PackageReader::from_bytes("Junk", &[0u8; 64]).unwrap_err();
        assert!(matches!(err, LinkError::InvalidMagic { .. }));
    }
}
