use std::collections::{HashMap, HashSet};

use tracing::debug;
use ulink_object::{
    Archive, FieldData, FieldKind, ObjectGraph, ObjectHandle, ObjectKind, PropertyType,
};

use crate::verify::ForceLoadRelation;

/// A force-loaded object that was still being placed when something it
/// depends on required it. Such an export cannot be ordered seek-free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForceLoadCycle {
    pub relation: ForceLoadRelation,
    pub source: ObjectHandle,
    pub target: ObjectHandle,
}

/// Insertion-based topological sort over an [`ObjectGraph`].
///
/// One sorter is meant to be reused across many roots: [`clear`](Self::clear)
/// drops the collected order but keeps the processed set, so an object
/// reached from an earlier root is never emitted twice.
pub struct DependencySorter<'g> {
    pub(crate) graph: &'g ObjectGraph,
    /// Growing order, built by insertion.
    pub(crate) referenced: Vec<ObjectHandle>,
    pub(crate) in_list: HashSet<ObjectHandle>,
    /// Visited-once set; the value is the order in which objects were first processed.
    pub(crate) processed: HashMap<ObjectHandle, usize>,
    pub(crate) serialized: HashSet<ObjectHandle>,
    /// Where requirements discovered mid-traversal are inserted.
    current_insert: Option<usize>,
    /// End of the seeded bootstrap region.
    pub(crate) core_offset: usize,
    pub(crate) core_classes: Vec<ObjectHandle>,
    ignore_field_refs: bool,
    /// Class whose own fields must not be pulled in while serializing a member's children.
    current_class: Option<ObjectHandle>,
    /// Objects whose `process_object` has not returned yet.
    in_progress: HashSet<ObjectHandle>,
    cycles: Vec<ForceLoadCycle>,
}

impl<'g> DependencySorter<'g> {
    /// Create a sorter seeded with the intrinsic classes and their default objects.
    pub fn new(graph: &'g ObjectGraph) -> Self {
        let mut sorter = Self {
            graph,
            referenced: Vec::new(),
            in_list: HashSet::new(),
            processed: HashMap::new(),
            serialized: HashSet::new(),
            current_insert: None,
            core_offset: 0,
            core_classes: Vec::new(),
            ignore_field_refs: false,
            current_class: None,
            in_progress: HashSet::new(),
            cycles: Vec::new(),
        };
        sorter.seed_core_classes();
        sorter
    }

    fn seed_core_classes(&mut self) {
        for &class in self.graph.bootstrap_classes() {
            if !self.core_classes.contains(&class) {
                self.core_classes.push(class);
            }
            self.push_unique(class);
            if let Some(cdo) = self.graph.default_object(class) {
                self.push_unique(cdo);
            }
        }
        for class in self.core_classes.clone() {
            self.process_struct(class);
        }
        self.core_offset = self.referenced.len();
        debug!(core_offset = self.core_offset, "seeded bootstrap classes");
    }

    fn push_unique(&mut self, object: ObjectHandle) {
        if self.in_list.insert(object) {
            self.referenced.push(object);
        }
    }

    /// Drop everything collected after the bootstrap region, and any
    /// recorded cycles. Processed and serialized sets are kept.
    pub fn clear(&mut self) {
        for object in self.referenced.drain(self.core_offset..) {
            self.in_list.remove(&object);
        }
        self.cycles.clear();
    }

    /// Force-load cycles met since the last [`clear`](Self::clear).
    pub fn cycles(&self) -> &[ForceLoadCycle] {
        &self.cycles
    }

    fn check_cycle(
        &mut self,
        source: ObjectHandle,
        target: Option<ObjectHandle>,
        relation: ForceLoadRelation,
    ) {
        if let Some(target) = target.filter(|t| self.in_progress.contains(t)) {
            self.cycles.push(ForceLoadCycle {
                relation,
                source,
                target,
            });
        }
    }

    /// Objects collected so far, optionally including the bootstrap region.
    pub fn export_list(&self, include_core: bool) -> Vec<ObjectHandle> {
        if include_core {
            self.referenced.clone()
        } else {
            self.referenced[self.core_offset..].to_vec()
        }
    }

    pub fn core_offset(&self) -> usize {
        self.core_offset
    }

    /// Position of `object` in the collected order.
    pub fn position(&self, object: ObjectHandle) -> Option<usize> {
        if !self.in_list.contains(&object) {
            return None;
        }
        self.referenced.iter().position(|o| *o == object)
    }

    pub fn is_processed(&self, object: ObjectHandle) -> bool {
        self.processed.contains_key(&object)
    }

    fn mark_processed(&mut self, object: ObjectHandle) {
        let order = self.processed.len();
        self.processed.entry(object).or_insert(order);
    }

    fn insert_index(&self) -> usize {
        self.current_insert.unwrap_or(self.referenced.len())
    }

    fn add_referenced(&mut self, object: ObjectHandle, index: usize) {
        if self.in_list.insert(object) {
            let index = index.min(self.referenced.len());
            self.referenced.insert(index, object);
        }
    }

    fn serialize_once(&mut self, object: ObjectHandle) {
        if self.serialized.insert(object) {
            let graph = self.graph;
            graph.serialize(object, self);
        }
    }

    /// Make sure `required` (or what loading it needs) sits before the
    /// current insert index, then advance the index past anything added.
    fn handle_dependency(&mut self, required: Option<ObjectHandle>, force_load: bool) {
        let Some(required) = required else {
            return;
        };
        let graph = self.graph;
        let previous_len = self.referenced.len();
        let previous_insert = self.insert_index();

        if graph.is_struct(required) {
            self.process_struct(required);
        } else if force_load {
            self.process_object(Some(required));
        } else {
            // Not force-loaded: only its class and archetype must precede the
            // referencer. Both are inserted at the same index, so the class
            // goes in last to land first.
            let outer = graph.outer_of(required);
            if outer.is_some_and(|o| !self.is_processed(o)) {
                self.handle_dependency(outer, false);
            }
            self.process_object(graph.archetype_of(required));
            self.process_struct(graph.class_of(required));
        }

        let insert_offset = self.insert_index() as isize - previous_insert as isize;
        let added = self.referenced.len() as isize - previous_len as isize;
        let advance = added - insert_offset;
        if advance > 0 {
            self.current_insert = Some(self.insert_index() + advance as usize);
        }
    }

    /// Add an object after everything its creation force-loads. Structs go
    /// through [`process_struct`](Self::process_struct).
    pub fn process_object(&mut self, object: Option<ObjectHandle>) {
        let Some(object) = object else {
            return;
        };
        let graph = self.graph;
        if graph.is_struct(object) {
            self.process_struct(object);
            return;
        }
        // Default objects are placed by their class.
        if graph.is_default_object(object) || self.is_processed(object) {
            return;
        }
        self.mark_processed(object);
        self.in_progress.insert(object);

        let recursive = self.current_insert.is_some();
        if !recursive {
            self.current_insert = Some(self.referenced.len());
        }

        self.handle_dependency(Some(graph.class_of(object)), true);
        self.handle_dependency(graph.outer_of(object), false);
        let archetype = graph.archetype_of(object);
        self.check_cycle(object, archetype, ForceLoadRelation::Archetype);
        self.handle_dependency(archetype, true);

        match &graph.object(object).kind {
            ObjectKind::Component(component) => {
                if component.template_owner_class.is_some() {
                    self.handle_dependency(component.template_owner_class, false);
                } else if component.template_name.is_none() && graph.is_template(object) {
                    self.check_cycle(
                        object,
                        component.source_default,
                        ForceLoadRelation::SourceDefaultObject,
                    );
                    self.handle_dependency(component.source_default, true);
                }
            }
            ObjectKind::Redirector(redirector) => {
                self.handle_dependency(redirector.destination, false);
            }
            _ => {}
        }

        self.add_referenced(object, self.insert_index());
        // Still in progress: references found while serializing land in front of it.
        self.serialize_once(object);
        self.in_progress.remove(&object);

        if !recursive {
            self.current_insert = None;
        }
    }

    /// Add a struct, function, state or class after its super, with its
    /// declared fields directly in front of it and (for classes) its default
    /// object directly behind it.
    ///
    /// # Panics
    ///
    /// Panics if a class's default object was already placed by someone else.
    pub fn process_struct(&mut self, object: ObjectHandle) {
        if self.is_processed(object) {
            return;
        }
        let graph = self.graph;
        self.mark_processed(object);

        let recursive = self.current_insert.is_some();
        if !recursive {
            self.current_insert = Some(self.referenced.len());
        }

        self.handle_dependency(graph.super_struct(object), false);
        self.add_referenced(object, self.insert_index());

        if self.serialized.insert(object) {
            let previous_ignore = self.ignore_field_refs;

            // Script and defaults first; the struct's own fields are deferred.
            self.ignore_field_refs = true;
            graph.serialize(object, self);

            self.ignore_field_refs = false;
            if graph.class_of(object) != graph.class_class() {
                self.current_class = graph.owner_class(object);
            }
            let data = graph.object(object).kind.as_struct();
            self.serialize_object(data.and_then(|s| s.children));
            self.current_class = None;
            self.serialize_object(data.and_then(|s| s.next));

            self.ignore_field_refs = previous_ignore;
        }

        if let Some(cdo) = graph.default_object(object) {
            if !self.is_processed(cdo) {
                self.mark_processed(cdo);
                self.serialize_once(cdo);

                let class_index = self.position(object).unwrap_or_else(|| {
                    panic!(
                        "class {} missing from sorted list while placing its default object",
                        graph.full_name(object)
                    )
                });
                assert!(
                    !self.in_list.contains(&cdo) || self.core_classes.contains(&object),
                    "default object {} was placed before its class {}",
                    graph.full_name(cdo),
                    graph.full_name(object)
                );
                self.add_referenced(cdo, class_index + 1);
            }
        }

        if !recursive {
            self.current_insert = None;
        }
    }
}

impl Archive for DependencySorter<'_> {
    fn serialize_object(&mut self, object: Option<ObjectHandle>) {
        let Some(object) = object else {
            return;
        };
        let graph = self.graph;
        if graph.is_default_object(object) || self.is_processed(object) {
            return;
        }

        let kind = &graph.object(object).kind;
        if !kind.is_field_like() {
            // Plain references are not force-loaded; only what creating the
            // target needs has to come first.
            self.handle_dependency(Some(object), false);
            return;
        }

        // Classes are always reached through ProcessStruct, never by reference.
        if self.ignore_field_refs || graph.is_class(object) {
            return;
        }
        if self.current_class.is_some() && graph.outer_of(object) == self.current_class {
            return;
        }

        if graph.is_struct(object) {
            self.process_struct(object);
            return;
        }

        if let ObjectKind::Field(FieldData {
            kind: FieldKind::Property(PropertyType::Byte {
                enum_def: Some(enum_def),
            }),
            ..
        }) = kind
        {
            self.handle_dependency(Some(*enum_def), true);
        }
        self.mark_processed(object);
        self.add_referenced(object, self.insert_index());
        self.serialize_once(object);
    }
}
