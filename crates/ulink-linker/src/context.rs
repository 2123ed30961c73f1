use std::collections::HashMap;

use ulink_object::{Guid, NameId, ObjectFlags, ObjectGraph, ObjectHandle};

/// Per-object marks set while saving one package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveMarks {
    /// Written into this package's export table.
    pub tag_exp: bool,
    /// Referenced from this package and resolved elsewhere.
    pub tag_imp: bool,
    /// Payload has been written.
    pub saved: bool,
    /// Excluded from this save regardless of its own flags.
    pub transient: bool,
    /// Still carries the force-export flag for this save.
    pub force_export: bool,
    /// Subset of [`ObjectFlags::LOAD_CONTEXT`] the object loads in.
    pub load: ObjectFlags,
}

/// Mutable state of the save pipeline.
///
/// Tagging never writes into the [`ObjectGraph`]. Everything it learns lives
/// here, is reset at the start of each save, and is applied back to the graph
/// only once the package has been written.
#[derive(Debug, Default)]
pub struct SaveContext {
    saving: bool,
    marks: HashMap<ObjectHandle, SaveMarks>,
    /// Load-context flags of every tagged name.
    names: HashMap<NameId, ObjectFlags>,
    cross_level_guids: HashMap<ObjectHandle, Guid>,
}

impl SaveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub(crate) fn begin_save(&mut self) -> bool {
        !std::mem::replace(&mut self.saving, true)
    }

    pub(crate) fn end_save(&mut self) {
        self.saving = false;
    }

    pub(crate) fn reset(&mut self) {
        self.marks.clear();
        self.names.clear();
    }

    pub fn marks(&self, object: ObjectHandle) -> SaveMarks {
        self.marks.get(&object).copied().unwrap_or_default()
    }

    pub(crate) fn marks_mut(&mut self, object: ObjectHandle) -> &mut SaveMarks {
        self.marks.entry(object).or_default()
    }

    pub fn is_export(&self, object: ObjectHandle) -> bool {
        self.marks(object).tag_exp
    }

    pub fn is_import(&self, object: ObjectHandle) -> bool {
        self.marks(object).tag_imp
    }

    /// Transient for this save, through its own flags or a save-time override.
    pub fn is_transient(&self, graph: &ObjectGraph, object: ObjectHandle) -> bool {
        self.marks(object).transient || graph.has_flags(object, ObjectFlags::TRANSIENT)
    }

    pub fn is_force_export(&self, object: ObjectHandle) -> bool {
        self.marks(object).force_export
    }

    pub fn load_flags(&self, object: ObjectHandle) -> ObjectFlags {
        self.marks(object).load
    }

    /// Objects tagged as exports or imports, in arena order.
    pub fn tagged(&self, graph: &ObjectGraph) -> Vec<ObjectHandle> {
        graph
            .handles()
            .filter(|h| {
                let marks = self.marks(*h);
                marks.tag_exp || marks.tag_imp
            })
            .collect()
    }

    pub(crate) fn tag_name(&mut self, name: NameId, flags: ObjectFlags) {
        self.names.entry(name).or_default().insert(flags);
    }

    pub fn is_name_tagged(&self, name: NameId) -> bool {
        self.names.contains_key(&name)
    }

    pub fn name_flags(&self, name: NameId) -> ObjectFlags {
        self.names.get(&name).copied().unwrap_or_default()
    }

    /// Tagged names in ordinal order.
    pub fn tagged_names(&self) -> Vec<NameId> {
        let mut names: Vec<NameId> = self.names.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// GUID assigned to a cross-level target, creating one on first use.
    pub fn cross_level_guid(&mut self, object: ObjectHandle) -> Guid {
        *self.cross_level_guids.entry(object).or_insert_with(Guid::new)
    }

    pub fn find_cross_level_guid(&self, object: ObjectHandle) -> Option<Guid> {
        self.cross_level_guids.get(&object).copied()
    }

    /// Write the load-context flags and force-export state computed for this
    /// save back onto the tagged objects.
    pub(crate) fn apply_to_graph(&self, graph: &mut ObjectGraph) {
        for (&object, marks) in &self.marks {
            if !(marks.tag_exp || marks.tag_imp) {
                continue;
            }
            let flags = &mut graph.object_mut(object).flags;
            flags.remove(ObjectFlags::LOAD_CONTEXT);
            flags.insert(marks.load);
            if marks.tag_exp && !marks.force_export {
                flags.remove(ObjectFlags::FORCE_TAG_EXP);
            }
        }
    }
}
