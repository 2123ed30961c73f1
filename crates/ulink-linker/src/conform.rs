//! Conforming a save against a prior version of the same package.
//!
//! A conformed save keeps every name, import and export that still exists
//! at the slot it had before, so the two files differ as little as possible.
//! The prior version is described by a [`ConformSource`], normally a
//! [`PackageReader`](crate::PackageReader) over the old file.

use serde::Serialize;
use tracing::{debug, error};
use ulink_conform::{conform_preserving, conform_with_placeholders, Conformed, FullNameKey};
use ulink_object::{
    FieldKind, FunctionFlags, Guid, NameId, ObjectFlags, ObjectGraph, ObjectHandle, ObjectKind,
    PackageFlags, PropertyFlags, StructKind, CORE_PACKAGE,
};

use crate::context::SaveContext;
use crate::error::{LinkError, LinkResult};
use crate::summary::GenerationInfo;
use crate::tables::{export_full_name, ObjectExport, ObjectImport};

/// Function flags compared between versions.
const FUNCTION_NET_FLAGS: u64 =
    FunctionFlags::NET.bits() | FunctionFlags::NET_SERVER.bits() | FunctionFlags::NET_CLIENT.bits();

/// Whether a replicated field is a property or a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReplicatedFieldKind {
    Property,
    Function,
}

/// A direct field of a class as the prior version declared it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplicatedField {
    pub name: String,
    pub kind: ReplicatedFieldKind,
    /// Property flags or function flags.
    pub flags: u64,
}

/// Replication metadata of one class in the prior version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplicationLayout {
    pub class_name: String,
    pub fields: Vec<ReplicatedField>,
}

/// The prior version of a package that a save is conformed against.
pub trait ConformSource {
    /// Name used in diagnostics.
    fn source_name(&self) -> &str;

    fn guid(&self) -> Guid;

    fn package_flags(&self) -> PackageFlags;

    fn generations(&self) -> &[GenerationInfo];

    /// Name table in slot order.
    fn names(&self) -> &[String];

    /// `"<Class> <Path>"` of every import, in slot order.
    fn import_full_names(&self) -> Vec<String>;

    /// `"<Class> <Root>.<Path>"` of every export with `root_name` as the
    /// root, in slot order.
    fn export_full_names(&self, root_name: &str) -> Vec<String>;

    fn replication_layouts(&self) -> Vec<ReplicationLayout>;

    /// Drop anything loaded only to answer the queries above.
    fn release_unreferenced(&mut self);
}

/// Reject a conform whose prior version replicates fields differently from
/// the classes about to be saved.
pub fn validate_conform(
    graph: &ObjectGraph,
    package: ObjectHandle,
    source: &mut dyn ConformSource,
) -> LinkResult<()> {
    let flags = graph
        .package_data(package)
        .map_or(PackageFlags::empty(), |data| data.flags);
    if flags.contains(PackageFlags::COOKED) || source.package_flags().contains(PackageFlags::COOKED)
    {
        debug!("skipping conform validation of cooked packages");
        return Ok(());
    }
    // Core declares no replicated fields.
    if graph.name(package).eq_ignore_ascii_case(CORE_PACKAGE) {
        return Ok(());
    }

    let mut mismatches = Vec::new();
    for layout in source.replication_layouts() {
        let Some(class) = graph
            .find_object(Some(package), &layout.class_name)
            .filter(|h| graph.is_class(*h))
        else {
            continue;
        };
        let fields = graph.fields(class);
        for old in &layout.fields {
            for &field in &fields {
                if !graph.name(field).eq_ignore_ascii_case(&old.name) {
                    continue;
                }
                match (old.kind, &graph.object(field).kind) {
                    (ReplicatedFieldKind::Property, ObjectKind::Field(data))
                        if matches!(data.kind, FieldKind::Property(_)) =>
                    {
                        let net = PropertyFlags::NET.bits();
                        if old.flags & net != data.flags & net {
                            mismatches.push(format!("property {}", graph.path_name(field, None)));
                        }
                    }
                    (ReplicatedFieldKind::Function, ObjectKind::Struct(data))
                        if data.kind == StructKind::Function =>
                    {
                        if old.flags & FUNCTION_NET_FLAGS != data.field_flags & FUNCTION_NET_FLAGS {
                            mismatches.push(format!("function {}", graph.path_name(field, None)));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    source.release_unreferenced();

    if mismatches.is_empty() {
        return Ok(());
    }
    for mismatch in &mismatches {
        error!(source = source.source_name(), "network flag mismatch for {mismatch}");
    }
    Err(LinkError::ConformIncompatibility { mismatches })
}

// ---------------------------------------------------------------
// Table ordering
// ---------------------------------------------------------------

/// Order the name table. Conformed, every prior name keeps its slot (and
/// loads in every context) and new names follow in ordinal order; otherwise
/// all names are in ordinal order.
pub fn sort_names(
    graph: &mut ObjectGraph,
    ctx: &mut SaveContext,
    conform: Option<&dyn ConformSource>,
) -> Vec<NameId> {
    let tagged = ctx.tagged_names();
    let Some(source) = conform else {
        return tagged;
    };

    let old: Vec<NameId> = source.names().iter().map(|name| graph.intern(name)).collect();
    let mut table = conform_preserving(&old, &tagged);
    table.sort_tail_by_key(|name| *name);
    let names: Vec<NameId> = table.into_entries().into_iter().flatten().collect();
    for &name in &names {
        ctx.tag_name(name, ObjectFlags::LOAD_CONTEXT);
    }
    debug!(old = old.len(), names = names.len(), "conformed name table");
    names
}

/// Order the import table by case-insensitive full name, matching prior
/// slots when conforming.
pub fn sort_imports(
    graph: &ObjectGraph,
    imports: Vec<ObjectImport>,
    conform: Option<&dyn ConformSource>,
) -> Vec<ObjectImport> {
    let key = |import: &ObjectImport| {
        FullNameKey::new(import.object.map(|h| graph.full_name(h)).unwrap_or_default())
    };
    let mut table = match conform {
        Some(source) => {
            let old: Vec<FullNameKey> = source
                .import_full_names()
                .into_iter()
                .map(FullNameKey::new)
                .collect();
            conform_with_placeholders(&old, imports, key)
        }
        None => Conformed::unconformed(imports),
    };
    table.sort_tail_by_key(key);
    table
        .into_entries()
        .into_iter()
        .map(|entry| entry.unwrap_or_else(ObjectImport::placeholder))
        .collect()
}

/// Order the export table by case-insensitive full name, matching prior
/// slots when conforming. Returns the table and the index of its first
/// entry that did not exist before.
pub fn sort_exports(
    graph: &ObjectGraph,
    root: ObjectHandle,
    exports: Vec<ObjectExport>,
    conform: Option<&dyn ConformSource>,
) -> (Vec<ObjectExport>, usize) {
    let key = |export: &ObjectExport| {
        FullNameKey::new(
            export
                .object
                .map(|h| export_full_name(graph, root, h))
                .unwrap_or_default(),
        )
    };
    let mut table = match conform {
        Some(source) => {
            let old: Vec<FullNameKey> = source
                .export_full_names(graph.name(root))
                .into_iter()
                .map(FullNameKey::new)
                .collect();
            conform_with_placeholders(&old, exports, key)
        }
        None => Conformed::unconformed(exports),
    };
    table.sort_tail_by_key(key);
    let first_sort_index = table.sort_start();

    let exports = table
        .into_entries()
        .into_iter()
        .enumerate()
        .map(|(slot, entry)| {
            entry.unwrap_or_else(|| {
                debug!(slot, "export placeholder for a removed object");
                ObjectExport::placeholder()
            })
        })
        .collect();
    (exports, first_sort_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulink_object::{ClassFlags, PropertyType};

    /// Prior version described directly, without a file.
    #[derive(Default)]
    struct MockSource {
        names: Vec<String>,
        imports: Vec<String>,
        exports: Vec<String>,
        layouts: Vec<ReplicationLayout>,
        generations: Vec<GenerationInfo>,
        released: bool,
    }

    impl ConformSource for MockSource {
        fn source_name(&self) -> &str {
            "mock"
        }

        fn guid(&self) -> Guid {
            Guid::zero()
        }

        fn package_flags(&self) -> PackageFlags {
            PackageFlags::empty()
        }

        fn generations(&self) -> &[GenerationInfo] {
            &self.generations
        }

        fn names(&self) -> &[String] {
            &self.names
        }

        fn import_full_names(&self) -> Vec<String> {
            self.imports.clone()
        }

        fn export_full_names(&self, _root_name: &str) -> Vec<String> {
            self.exports.clone()
        }

        fn replication_layouts(&self) -> Vec<ReplicationLayout> {
            self.layouts.clone()
        }

        fn release_unreferenced(&mut self) {
            self.released = true;
        }
    }

    fn replicated_class() -> (ObjectGraph, ObjectHandle) {
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
        (graph, pkg)
    }

    fn layout(property_flags: u64, function_flags: u64) -> ReplicationLayout {
        ReplicationLayout {
            class_name: "Pawn".into(),
            fields: vec![
                ReplicatedField {
                    name: "Health".into(),
                    kind: ReplicatedFieldKind::Property,
                    flags: property_flags,
                },
                ReplicatedField {
                    name: "ServerMove".into(),
                    kind: ReplicatedFieldKind::Function,
                    flags: function_flags,
                },
            ],
        }
    }

    #[test]
    fn matching_replication_passes_and_releases() {
        let (graph, pkg) = replicated_class();
        let mut source = MockSource {
            layouts: vec![layout(
                PropertyFlags::NET.bits(),
                FunctionFlags::NET.bits() | FunctionFlags::NET_SERVER.bits(),
            )],
            ..Default::default()
        };
        validate_conform(&graph, pkg, &mut source).unwrap();
        assert!(source.released);
    }

    #[test]
    fn changed_net_flags_are_reported_per_field() {
        let (graph, pkg) = replicated_class();
        let mut source = MockSource {
            layouts: vec![layout(0, FunctionFlags::NET.bits() | FunctionFlags::NET_CLIENT.bits())],
            ..Default::default()
        };
        let err = validate_conform(&graph, pkg, &mut source).unwrap_err();
        match err {
            LinkError::ConformIncompatibility { mismatches } => {
                assert_eq!(
                    mismatches,
                    vec!["property Game.Pawn.Health", "function Game.Pawn.ServerMove"]
                );
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(source.released);
    }

    #[test]
    fn cooked_packages_skip_validation() {
        let (mut graph, pkg) = replicated_class();
        graph.package_data_mut(pkg).unwrap().flags = PackageFlags::COOKED;
        let mut source = MockSource {
            layouts: vec![layout(0, 0)],
            ..Default::default()
        };
        validate_conform(&graph, pkg, &mut source).unwrap();
    }

    #[test]
    fn conformed_names_keep_old_slots() {
        let mut graph = ObjectGraph::new();
        let beta = graph.intern("Beta");
        let alpha = graph.intern("Alpha");
        let mut ctx = SaveContext::new();
        ctx.tag_name(alpha, ObjectFlags::LOAD_FOR_EDIT);
        ctx.tag_name(beta, ObjectFlags::LOAD_FOR_EDIT);

        let source = MockSource {
            names: vec!["alpha".into(), "Gone".into()],
            ..Default::default()
        };
        let names = sort_names(&mut graph, &mut ctx, Some(&source));
        let gone = graph.names().find("Gone").unwrap();
        assert_eq!(names, vec![alpha, gone, beta]);
        assert_eq!(ctx.name_flags(alpha), ObjectFlags::LOAD_CONTEXT);
    }

    #[test]
    fn removed_imports_leave_placeholders() {
        let graph = ObjectGraph::new();
        let object = graph.intrinsic_class("Object").unwrap();
        let field = graph.intrinsic_class("Field").unwrap();
        let imports = vec![ObjectImport::new(&graph, field), ObjectImport::new(&graph, object)];
        let source = MockSource {
            imports: vec!["Class Core.Object".into(), "Class Core.Vanished".into()],
            ..Default::default()
        };
        let sorted = sort_imports(&graph, imports, Some(&source));
        assert_eq!(sorted[0].object, Some(object));
        assert_eq!(sorted[1], ObjectImport::placeholder());
        assert_eq!(sorted[2].object, Some(field));
    }

    #[test]
    fn unconformed_exports_sort_by_full_name() {
        let mut graph = ObjectGraph::new();
        let pkg = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let zed = graph.create_class(pkg, "Zed", Some(object), ClassFlags::empty()).unwrap();
        let able = graph.create_class(pkg, "able", Some(object), ClassFlags::empty()).unwrap();
        let ctx = SaveContext::new();
        let exports = vec![
            ObjectExport::new(&graph, &ctx, zed),
            ObjectExport::new(&graph, &ctx, able),
        ];
        let (sorted, first) = sort_exports(&graph, pkg, exports, None);
        assert_eq!(first, 0);
        assert_eq!(sorted[0].object, Some(able));
        assert_eq!(sorted[1].object, Some(zed));
    }
}
