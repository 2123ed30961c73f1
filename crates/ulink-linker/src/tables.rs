//! Name, import and export tables as the writer builds them.

use std::collections::HashMap;

use tracing::warn;
use ulink_object::{Guid, NameId, ObjectFlags, ObjectGraph, ObjectHandle, PackageFlags};

use crate::context::SaveContext;
use crate::error::{LinkError, LinkResult};
use crate::index::PackageIndex;
use crate::wire::Encoder;

/// Export flag: the object lives outside the package and was forced in.
pub const EXPORT_FORCED: u32 = 0x1;

/// A reference to an object that lives in another package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectImport {
    pub class_package: NameId,
    pub class_name: NameId,
    pub outer_index: PackageIndex,
    pub object_name: NameId,
    /// `None` for a conform placeholder.
    pub object: Option<ObjectHandle>,
}

impl ObjectImport {
    pub fn new(graph: &ObjectGraph, object: ObjectHandle) -> Self {
        let class = graph.class_of(object);
        let class_package = graph
            .outer_of(class)
            .map_or(NameId::NONE, |outer| graph.object(outer).name);
        Self {
            class_package,
            class_name: graph.object(class).name,
            outer_index: PackageIndex::NULL,
            object_name: graph.object(object).name,
            object: Some(object),
        }
    }

    pub fn placeholder() -> Self {
        Self {
            class_package: NameId::NONE,
            class_name: NameId::NONE,
            outer_index: PackageIndex::NULL,
            object_name: NameId::NONE,
            object: None,
        }
    }

    pub(crate) fn encode(&self, names: &NameMap, enc: &mut Encoder) -> LinkResult<()> {
        enc.u32(names.get(self.class_package)?)
            .u32(names.get(self.class_name)?)
            .index(self.outer_index)
            .u32(names.get(self.object_name)?);
        Ok(())
    }
}

/// One object written by this package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectExport {
    /// `None` for a conform placeholder.
    pub object: Option<ObjectHandle>,
    pub class_index: PackageIndex,
    pub super_index: PackageIndex,
    pub outer_index: PackageIndex,
    pub object_name: NameId,
    pub archetype_index: PackageIndex,
    pub object_flags: ObjectFlags,
    pub serial_size: u32,
    pub serial_offset: u32,
    pub export_flags: u32,
    /// Package exports only.
    pub package_guid: Guid,
    pub package_flags: PackageFlags,
    pub generation_net_object_counts: Vec<u32>,
}

impl ObjectExport {
    pub fn new(graph: &ObjectGraph, ctx: &SaveContext, object: ObjectHandle) -> Self {
        let mut object_flags = graph
            .flags(object)
            .intersection(ObjectFlags::PERSISTENT);
        object_flags.remove(ObjectFlags::LOAD_CONTEXT);
        object_flags.insert(ctx.load_flags(object));

        let mut export = Self {
            object: Some(object),
            object_name: graph.object(object).name,
            object_flags,
            export_flags: if ctx.is_force_export(object) {
                EXPORT_FORCED
            } else {
                0
            },
            ..Self::placeholder()
        };
        if let Some(data) = graph.package_data(object) {
            export.package_flags = data.flags;
            if !data.flags.contains(PackageFlags::SERVER_SIDE_ONLY) {
                export.package_guid = data.guid;
                export.generation_net_object_counts = data.generation_net_object_counts.clone();
            }
        }
        export
    }

    pub fn placeholder() -> Self {
        Self {
            object: None,
            class_index: PackageIndex::NULL,
            super_index: PackageIndex::NULL,
            outer_index: PackageIndex::NULL,
            object_name: NameId::NONE,
            archetype_index: PackageIndex::NULL,
            object_flags: ObjectFlags::empty(),
            serial_size: 0,
            serial_offset: 0,
            export_flags: 0,
            package_guid: Guid::zero(),
            package_flags: PackageFlags::empty(),
            generation_net_object_counts: Vec::new(),
        }
    }

    /// Fill in the header indices once every table slot is final.
    pub fn resolve_indices(&mut self, graph: &ObjectGraph, package: ObjectHandle, map: &IndexMap) {
        let Some(object) = self.object else {
            return;
        };
        let class = graph.class_of(object);
        self.class_index = if graph.is_class(object) {
            PackageIndex::NULL
        } else {
            map.get(class)
        };
        self.super_index = graph
            .super_struct(object)
            .map_or(PackageIndex::NULL, |parent| map.get(parent));
        self.outer_index = match graph.outer_of(object) {
            Some(outer) if outer != package => map.get(outer),
            _ => PackageIndex::NULL,
        };
        self.archetype_index = match graph.archetype_of(object) {
            Some(template) if Some(template) != graph.default_object(class) => map.get(template),
            _ => PackageIndex::NULL,
        };
    }

    pub(crate) fn encode(&self, names: &NameMap, enc: &mut Encoder) -> LinkResult<()> {
        enc.index(self.class_index)
            .index(self.super_index)
            .index(self.outer_index)
            .u32(names.get(self.object_name)?)
            .index(self.archetype_index)
            .u64(self.object_flags.bits())
            .u32(self.serial_size)
            .u32(self.serial_offset)
            .u32(self.export_flags)
            .guid(&self.package_guid)
            .u32(self.package_flags.bits());
        enc.count(self.generation_net_object_counts.len(), "generation net object counts")?;
        for count in &self.generation_net_object_counts {
            enc.u32(*count);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------
// Table construction
// ---------------------------------------------------------------

/// Imports for every object tagged as one, in graph order.
pub fn build_imports(graph: &ObjectGraph, ctx: &SaveContext) -> Vec<ObjectImport> {
    graph
        .handles()
        .filter(|h| ctx.is_import(*h))
        .map(|h| ObjectImport::new(graph, h))
        .collect()
}

/// Exports for every object tagged as one, in graph order.
pub fn build_exports(graph: &ObjectGraph, ctx: &SaveContext) -> Vec<ObjectExport> {
    graph
        .handles()
        .filter(|h| ctx.is_export(*h))
        .map(|h| ObjectExport::new(graph, ctx, h))
        .collect()
}

/// Identity of an export for conforming: `"<Class> <Root>.<Path>"`, or
/// `"<Class> <Root>"` for the root itself.
pub fn export_full_name(graph: &ObjectGraph, root: ObjectHandle, object: ObjectHandle) -> String {
    if object == root {
        return graph.full_name(object);
    }
    format!(
        "{} {}.{}",
        graph.class_name(object),
        graph.name(root),
        graph.path_name(object, Some(root))
    )
}

// ---------------------------------------------------------------
// Index lookup
// ---------------------------------------------------------------

/// Name table slot of every mapped name.
#[derive(Debug, Default)]
pub struct NameMap {
    slots: HashMap<NameId, u32>,
}

impl NameMap {
    pub fn new(names: &[NameId]) -> Self {
        let slots = names
            .iter()
            .enumerate()
            .map(|(slot, name)| (*name, slot as u32))
            .collect();
        Self { slots }
    }

    pub fn lookup(&self, name: NameId) -> Option<u32> {
        self.slots.get(&name).copied()
    }

    pub(crate) fn get(&self, name: NameId) -> LinkResult<u32> {
        self.lookup(name)
            .ok_or_else(|| LinkError::NameNotMapped(format!("#{}", name.ordinal())))
    }
}

/// Package index of every object that has a table slot.
#[derive(Debug, Default)]
pub struct IndexMap {
    slots: HashMap<ObjectHandle, PackageIndex>,
}

impl IndexMap {
    pub fn new(imports: &[ObjectImport], exports: &[ObjectExport]) -> Self {
        let mut slots = HashMap::with_capacity(imports.len() + exports.len());
        for (i, import) in imports.iter().enumerate() {
            if let Some(object) = import.object {
                slots.insert(object, PackageIndex::from_import(i));
            }
        }
        for (i, export) in exports.iter().enumerate() {
            if let Some(object) = export.object {
                slots.insert(object, PackageIndex::from_export(i));
            }
        }
        Self { slots }
    }

    /// The object's index, or null when it has no slot.
    pub fn get(&self, object: ObjectHandle) -> PackageIndex {
        self.slots.get(&object).copied().unwrap_or_default()
    }
}

/// Outer index of each import, set once the import order is final. Outers
/// inside the saved package cannot be imported and are left null.
pub fn resolve_import_outers(
    graph: &ObjectGraph,
    package: ObjectHandle,
    imports: &mut [ObjectImport],
    map: &IndexMap,
) {
    for import in imports.iter_mut() {
        let Some(object) = import.object else {
            continue;
        };
        let Some(outer) = graph.outer_of(object) else {
            continue;
        };
        let index = map.get(outer);
        if index.is_export() || outer == package || graph.is_in(outer, package) {
            warn!(
                import = %graph.full_name(object),
                outer = %graph.full_name(outer),
                "bad import: outer is inside the saved package"
            );
            continue;
        }
        import.outer_index = index;
    }
}
