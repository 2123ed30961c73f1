//! Package linker for ulink.
//!
//! Saves the objects of one package from an [`ObjectGraph`](ulink_object::ObjectGraph)
//! into a single binary container that loads with forward reads only, can be
//! kept slot-compatible with an earlier version of itself, and can be
//! chunk-compressed.
//!
//! # Architecture
//!
//! ```text
//! clear_marks ─► tag exports ─► tag imports/names ─► illegal reference check
//!      │
//!      ▼
//! build name/import/export tables ─► conform ─► seek-free order ─► depends map
//!      │
//!      ▼
//! placeholder summary, names, tables, depends, GUIDs, thumbnails, payloads
//!      │
//!      ▼
//! rewrite tables and summary ─► [compress] ─► rename over destination
//! ```
//!
//! # Key Types
//!
//! - [`PackageWriter`] -- Runs the save pipeline with a [`LinkerConfig`]
//! - [`SaveContext`] -- Per-save marks and the "saving in progress" flag
//! - [`PackageReader`] -- Parses a saved package; a [`ConformSource`] for the next save
//! - [`PackageIndex`] -- Signed table index (0 null, positive export, negative import)
//! - [`PackageSummary`] -- Fixed header with table offsets, generations and chunks

mod archive;
pub mod compress;
pub mod config;
pub mod conform;
pub mod context;
pub mod cross_level;
pub mod error;
pub mod illegal;
pub mod index;
pub mod reader;
pub mod seek_free;
pub mod summary;
pub mod tables;
pub mod tagger;
pub mod thumbnails;
mod wire;
pub mod writer;

pub use compress::{
    compress_package, decompress_package, plan_chunks, CompressionCodec, ZstdCodec,
    COMPRESS_ZSTD,
};
pub use config::{LinkerConfig, DEFAULT_MAX_CHUNK_SIZE};
pub use conform::{ConformSource, ReplicatedField, ReplicatedFieldKind, ReplicationLayout};
pub use context::{SaveContext, SaveMarks};
pub use error::{IllegalReason, IllegalReference, LinkError, LinkResult};
pub use index::PackageIndex;
pub use reader::{ExportEntry, ImportEntry, NameEntry, PackageReader};
pub use summary::{CompressedChunk, GenerationInfo, PackageSummary, PACKAGE_FILE_TAG};
pub use tables::{ObjectExport, ObjectImport};
pub use thumbnails::ThumbnailEntry;
pub use writer::{PackageWriter, SaveOptions, SavePhase, SaveReport};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use ulink_object::{ClassFlags, ObjectFlags, ObjectGraph, ObjectHandle, PropertyValue};

    fn save(
        graph: &mut ObjectGraph,
        package: ObjectHandle,
        path: &Path,
        base: Option<ObjectHandle>,
        conform: Option<&mut dyn ConformSource>,
    ) -> LinkResult<SaveReport> {
        let options = SaveOptions {
            base,
            top_level_flags: ObjectFlags::STANDALONE,
            conform,
            ..Default::default()
        };
        PackageWriter::new(LinkerConfig::default()).save(
            &mut SaveContext::new(),
            graph,
            package,
            path,
            options,
        )
    }

    #[test]
    fn private_reference_aborts_with_chain() {
        let mut graph = ObjectGraph::new();
        let game = graph.create_package("Game").unwrap();
        let other = graph.create_package("Other").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let class = graph.create_class(game, "Thing", Some(object), ClassFlags::empty()).unwrap();
        let r = graph.create_object(class, game, "R", ObjectFlags::PUBLIC).unwrap();
        let a = graph.create_object(class, game, "A", ObjectFlags::PUBLIC).unwrap();
        let b = graph.create_object(class, other, "B", ObjectFlags::empty()).unwrap();
        graph.set_property(r, "Child", PropertyValue::Object(Some(a))).unwrap();
        graph.set_property(a, "Secret", PropertyValue::Object(Some(b))).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");
        fs::write(&path, b"previous version").unwrap();

        let err = save(&mut graph, game, &path, Some(r), None).unwrap_err();
        let LinkError::IllegalReference(report) = err else {
            panic!("expected an illegal reference, got {err}");
        };
        assert_eq!(report.reason, IllegalReason::Private);
        assert_eq!(report.chain, vec!["Game.R", "Game.A", "Other.B"]);
        assert_eq!(report.objects, vec!["Thing Other.B"]);

        assert_eq!(fs::read(&path).unwrap(), b"previous version");
        assert!(!dir.path().join("Game.upk_save.tmp").exists());
    }

    #[test]
    fn classes_precede_their_defaults_and_subclasses() {
        let mut graph = ObjectGraph::new();
        let game = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let x = graph.create_class(game, "X", Some(object), ClassFlags::empty()).unwrap();
        let y = graph.create_class(game, "Y", Some(x), ClassFlags::empty()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");
        save(&mut graph, game, &path, Some(y), None).unwrap();

        let reader = PackageReader::open(&path).unwrap();
        let names: Vec<&str> = reader.exports().iter().map(|e| e.object_name.as_str()).collect();
        assert_eq!(names, vec!["X", "Default__X", "Y", "Default__Y"]);

        let y_export = &reader.exports()[2];
        assert_eq!(y_export.super_index, PackageIndex::from_export(0));
        assert!(y_export.class_index.is_null());
        let y_default = &reader.exports()[3];
        assert_eq!(y_default.class_index, PackageIndex::from_export(2));
    }

    fn conform_fixture() -> (ObjectGraph, ObjectHandle, [ObjectHandle; 3]) {
        let mut graph = ObjectGraph::new();
        let game = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let class = graph.create_class(game, "Thing", Some(object), ClassFlags::empty()).unwrap();
        let standalone = ObjectFlags::PUBLIC | ObjectFlags::STANDALONE;
        let a = graph.create_object(class, game, "A", standalone).unwrap();
        let b = graph.create_object(class, game, "B", standalone).unwrap();
        let extra = graph.create_object(class, game, "Extra", standalone).unwrap();
        graph.set_property(a, "Partner", PropertyValue::Object(Some(b))).unwrap();
        graph.set_property(extra, "Label", PropertyValue::Str("gone soon".into())).unwrap();
        (graph, game, [a, b, extra])
    }

    #[test]
    fn conformed_resave_keeps_every_table_slot() {
        let (mut graph, game, _) = conform_fixture();
        let dir = tempfile::tempdir().unwrap();
        let first_path = dir.path().join("Game.upk");
        save(&mut graph, game, &first_path, None, None).unwrap();
        let first = PackageReader::open(&first_path).unwrap();

        let second_path = dir.path().join("second").join("Game.upk");
        fs::create_dir_all(second_path.parent().unwrap()).unwrap();
        let mut source = PackageReader::open(&first_path).unwrap();
        save(&mut graph, game, &second_path, None, Some(&mut source)).unwrap();
        assert!(source.is_released());
        let second = PackageReader::open(&second_path).unwrap();

        assert_eq!(second.names(), first.names());
        assert_eq!(second.import_full_names(), first.import_full_names());
        assert_eq!(second.export_full_names("Game"), first.export_full_names("Game"));
        assert_eq!(second.summary().guid, first.summary().guid);
        assert_eq!(second.summary().generations.len(), 2);
    }

    #[test]
    fn conformed_save_with_changes_keeps_surviving_slots() {
        let (mut graph, game, [_, _, extra]) = conform_fixture();
        let dir = tempfile::tempdir().unwrap();
        let first_path = dir.path().join("Game.upk");
        save(&mut graph, game, &first_path, None, None).unwrap();
        let first = PackageReader::open(&first_path).unwrap();

        graph.object_mut(extra).flags.insert(ObjectFlags::TRANSIENT);
        let class = graph.find_object(Some(game), "Thing").unwrap();
        graph
            .create_object(class, game, "Newcomer", ObjectFlags::PUBLIC | ObjectFlags::STANDALONE)
            .unwrap();

        let second_path = dir.path().join("next").join("Game.upk");
        fs::create_dir_all(second_path.parent().unwrap()).unwrap();
        let mut source = PackageReader::open(&first_path).unwrap();
        let report = save(&mut graph, game, &second_path, None, Some(&mut source)).unwrap();
        assert_eq!(report.placeholders, 1);
        let second = PackageReader::open(&second_path).unwrap();

        assert_eq!(&second.names()[..first.names().len()], first.names());

        let old = first.export_full_names("Game");
        let new = second.export_full_names("Game");
        for (slot, name) in old.iter().enumerate() {
            if name.ends_with(".Extra") {
                assert_eq!(second.exports()[slot].object_name, "None");
            } else {
                assert_eq!(&new[slot], name);
            }
        }
        assert_eq!(new.len(), old.len() + 1);
        assert_eq!(new[old.len()], "Thing Game.Newcomer");
    }

    #[test]
    fn compressed_save_reads_like_the_plain_one() {
        let (mut graph, game, _) = conform_fixture();
        let dir = tempfile::tempdir().unwrap();
        let plain_path = dir.path().join("Game.upk");
        save(&mut graph, game, &plain_path, None, None).unwrap();

        let packed_dir = dir.path().join("packed");
        fs::create_dir_all(&packed_dir).unwrap();
        let packed_path = packed_dir.join("Game.upk");
        let config = LinkerConfig {
            force_compression: true,
            max_chunk_size: 32,
            ..Default::default()
        };
        let options = SaveOptions {
            top_level_flags: ObjectFlags::STANDALONE,
            ..Default::default()
        };
        let report = PackageWriter::new(config)
            .save(&mut SaveContext::new(), &mut graph, game, &packed_path, options)
            .unwrap();
        assert!(report.compressed);

        let plain = PackageReader::open(&plain_path).unwrap();
        let packed = PackageReader::open(&packed_path).unwrap();
        assert!(packed.file_summary().compressed_chunks.len() > 1);
        assert_eq!(packed.names(), plain.names());
        assert_eq!(packed.exports(), plain.exports());
        for slot in 0..plain.exports().len() {
            assert_eq!(packed.payload(slot), plain.payload(slot));
        }
    }

    #[test]
    fn recursive_save_is_refused() {
        let (mut graph, game, _) = conform_fixture();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.upk");

        let mut ctx = SaveContext::new();
        assert!(ctx.begin_save());
        let err = PackageWriter::new(LinkerConfig::default())
            .save(&mut ctx, &mut graph, game, &path, SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, LinkError::RecursiveSave(_)));
        assert!(ctx.is_saving());
        assert!(!path.exists());
    }
}
