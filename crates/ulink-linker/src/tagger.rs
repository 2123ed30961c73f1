//! Reachability tagging for one save.
//!
//! Three walks over the graph, all recording into a [`SaveContext`]:
//!
//! 1. [`clear_marks`] resets the per-save state and decides which objects are
//!    transient for this save.
//! 2. [`ExportTagger`] follows references from the save roots and marks every
//!    object owned by (or forced into) the package as an export.
//! 3. [`ImportTagger`] serializes each export and marks everything it reaches
//!    outside the export set as an import, collecting dependencies and names.

use std::collections::{HashMap, VecDeque};

use tracing::debug;
use ulink_object::{
    Archive, ClassFlags, NameId, ObjectFlags, ObjectGraph, ObjectHandle, ObjectKind,
};

use crate::context::SaveContext;
use crate::error::{LinkError, LinkResult};

/// Load-context flags for an object that has none of the matching `NOT_FOR_*` flags.
pub(crate) fn load_flags_from_exclusions(flags: ObjectFlags) -> ObjectFlags {
    let mut load = ObjectFlags::empty();
    if !flags.contains(ObjectFlags::NOT_FOR_EDIT) {
        load.insert(ObjectFlags::LOAD_FOR_EDIT);
    }
    if !flags.contains(ObjectFlags::NOT_FOR_CLIENT) {
        load.insert(ObjectFlags::LOAD_FOR_CLIENT);
    }
    if !flags.contains(ObjectFlags::NOT_FOR_SERVER) {
        load.insert(ObjectFlags::LOAD_FOR_SERVER);
    }
    load
}

// ---------------------------------------------------------------
// Clear pass
// ---------------------------------------------------------------

/// Reset tagging state for a save of `package`.
///
/// Objects of the package (and forced exports) start with no load flags so
/// tagging recomputes them; everything else keeps the flags it was loaded
/// with. Instances of abstract or deprecated classes are transient for the
/// save, and so are the components a deprecated instance owns.
pub fn clear_marks(graph: &ObjectGraph, ctx: &mut SaveContext, package: ObjectHandle) {
    ctx.reset();

    for object in graph.handles() {
        let flags = graph.flags(object);
        let force_export = flags.contains(ObjectFlags::FORCE_TAG_EXP);
        let marks = ctx.marks_mut(object);
        marks.force_export = force_export;
        marks.load = if graph.is_in(object, package) || force_export {
            ObjectFlags::empty()
        } else {
            flags.intersection(ObjectFlags::LOAD_CONTEXT)
        };

        let class = graph.class_of(object);
        let class_flags = graph.class_flags(class);
        let is_default = graph.is_default_object(object);
        // A default object is always saved with its class.
        if is_default || !class_flags.intersects(ClassFlags::ABSTRACT | ClassFlags::DEPRECATED) {
            continue;
        }
        ctx.marks_mut(object).transient = true;
        if class_flags.contains(ClassFlags::HAS_COMPONENTS) {
            for reference in graph.references(object) {
                if matches!(graph.object(reference.target).kind, ObjectKind::Component(_)) {
                    ctx.marks_mut(reference.target).transient = true;
                }
            }
        }
    }
}

// ---------------------------------------------------------------
// Export tagging
// ---------------------------------------------------------------

/// Marks every object reachable from the save roots that belongs in the
/// package's export table.
pub struct ExportTagger<'a> {
    graph: &'a ObjectGraph,
    ctx: &'a mut SaveContext,
    package: ObjectHandle,
    queue: VecDeque<ObjectHandle>,
    error: Option<LinkError>,
}

impl<'a> ExportTagger<'a> {
    pub fn new(graph: &'a ObjectGraph, ctx: &'a mut SaveContext, package: ObjectHandle) -> Self {
        Self {
            graph,
            ctx,
            package,
            queue: VecDeque::new(),
            error: None,
        }
    }

    /// Tag `base` and everything its payload reaches.
    pub fn process_base(&mut self, base: ObjectHandle) {
        self.tag(base);
        self.process_queue();
    }

    fn process_queue(&mut self) {
        while let Some(object) = self.queue.pop_front() {
            if self.error.is_some() {
                self.queue.clear();
                return;
            }
            let graph = self.graph;
            graph.serialize(object, self);
        }
    }

    /// First error found while tagging.
    pub fn finish(self) -> LinkResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn tag(&mut self, object: ObjectHandle) {
        if self.error.is_some() {
            return;
        }
        let graph = self.graph;
        let in_package = graph.is_in(object, self.package);
        let marks = self.ctx.marks(object);
        if !(in_package || marks.force_export)
            || marks.tag_exp
            || self.ctx.is_transient(graph, object)
        {
            return;
        }

        {
            let marks = self.ctx.marks_mut(object);
            if in_package {
                marks.force_export = false;
            }
            marks.tag_exp = true;
        }

        // The archetype first, so its load flags are final before ours are compared to them.
        let template = graph.archetype_of(object);
        if let Some(template) = template {
            self.tag(template);
        }

        let class = graph.class_of(object);
        if graph.is_default_object(object) {
            let marks = self.ctx.marks_mut(object);
            if graph.is_intrinsic_class(class) {
                // Intrinsic defaults carry no saveable state.
                marks.tag_exp = false;
            } else {
                marks.load = ObjectFlags::LOAD_CONTEXT;
            }
        } else {
            let load = load_flags_from_exclusions(graph.flags(object));
            self.ctx.marks_mut(object).load.insert(load);

            if let Some(template) = template {
                let intrinsic_default = graph.is_default_object(template)
                    && graph.is_intrinsic_class(graph.class_of(template));
                if !intrinsic_default {
                    if let Err(err) = self.check_template(object, template) {
                        self.error = Some(err);
                        return;
                    }
                }
            }
        }

        self.tag(class);
        if let Some(outer) = graph.outer_of(object) {
            self.tag(outer);
        }
        self.queue.push_back(object);
    }

    /// A template must load everywhere the objects derived from it load.
    /// Within the package the template's flags are widened; a foreign
    /// template that would be missing is an error.
    fn check_template(&mut self, object: ObjectHandle, template: ObjectHandle) -> LinkResult<()> {
        let graph = self.graph;
        let load = self.ctx.load_flags(object);

        let foreign = !graph.is_in(template, graph.outermost(object))
            && !self.ctx.is_force_export(template)
            && (!self.ctx.is_force_export(object) || !graph.is_in(template, self.package));
        if foreign {
            let template_flags = graph.flags(template);
            let mut missing = Vec::new();
            for (load_bit, not_for, label) in [
                (ObjectFlags::LOAD_FOR_EDIT, ObjectFlags::NOT_FOR_EDIT, "LOAD_FOR_EDIT"),
                (ObjectFlags::LOAD_FOR_CLIENT, ObjectFlags::NOT_FOR_CLIENT, "LOAD_FOR_CLIENT"),
                (ObjectFlags::LOAD_FOR_SERVER, ObjectFlags::NOT_FOR_SERVER, "LOAD_FOR_SERVER"),
            ] {
                if load.contains(load_bit) && template_flags.contains(not_for) {
                    missing.push(label);
                }
            }
            if !missing.is_empty() {
                let is_component = matches!(graph.object(object).kind, ObjectKind::Component(_));
                let kind = if is_component && graph.is_template(template) {
                    "component template parent"
                } else {
                    "object archetype"
                };
                return Err(LinkError::MismatchedLoadFlags {
                    flags: missing.join(","),
                    kind,
                    object: graph.path_name(object, None),
                    template: graph.path_name(template, None),
                });
            }
        }

        self.ctx.marks_mut(template).load.insert(load);
        Ok(())
    }
}

impl Archive for ExportTagger<'_> {
    fn serialize_object(&mut self, object: Option<ObjectHandle>) {
        if let Some(object) = object {
            self.tag(object);
        }
    }
}

/// Tag the exports of `package`, starting from `base` and every object of
/// the package carrying one of `top_level_flags`. Returns the roots used.
pub fn tag_package_exports(
    graph: &ObjectGraph,
    ctx: &mut SaveContext,
    package: ObjectHandle,
    base: Option<ObjectHandle>,
    top_level_flags: ObjectFlags,
) -> LinkResult<Vec<ObjectHandle>> {
    let mut roots = Vec::new();
    let mut tagger = ExportTagger::new(graph, ctx, package);

    if let Some(base) = base {
        roots.push(base);
        tagger.process_base(base);
    }
    if !top_level_flags.is_empty() {
        for object in graph.handles() {
            if graph.has_flags(object, top_level_flags) && graph.is_in(object, package) {
                roots.push(object);
                tagger.process_base(object);
            }
        }
    }
    tagger.finish()?;

    debug!(
        roots = roots.len(),
        exports = graph.handles().filter(|h| ctx.is_export(*h)).count(),
        "tagged exports"
    );
    Ok(roots)
}

// ---------------------------------------------------------------
// Import tagging
// ---------------------------------------------------------------

/// Serializes one export and marks every non-export it references as an import.
pub struct ImportTagger<'a> {
    graph: &'a ObjectGraph,
    ctx: &'a mut SaveContext,
    /// Load context names found in this export are tagged with.
    context: ObjectFlags,
    dependencies: Vec<ObjectHandle>,
    cross_level_pending: bool,
}

impl<'a> ImportTagger<'a> {
    pub fn new(graph: &'a ObjectGraph, ctx: &'a mut SaveContext, context: ObjectFlags) -> Self {
        Self {
            graph,
            ctx,
            context,
            dependencies: Vec::new(),
            cross_level_pending: false,
        }
    }

    /// Objects that must be loaded before the export, in discovery order.
    pub fn into_dependencies(self) -> Vec<ObjectHandle> {
        self.dependencies
    }

    fn is_native(&self, object: ObjectHandle) -> bool {
        let graph = self.graph;
        if graph.has_flags(object, ObjectFlags::NATIVE) {
            return true;
        }
        let mut outer = graph.outer_of(object);
        while let Some(o) = outer {
            if graph.is_class(o) && graph.has_flags(o, ObjectFlags::NATIVE) {
                return true;
            }
            outer = graph.outer_of(o);
        }
        false
    }

    fn tag(&mut self, object: ObjectHandle) {
        let graph = self.graph;
        let flags = graph.flags(object);
        if flags.contains(ObjectFlags::PENDING_KILL) {
            return;
        }
        if self.ctx.is_transient(graph, object) && !flags.contains(ObjectFlags::NATIVE) {
            return;
        }

        let top_level_package = graph.outer_of(object).is_none() && graph.is_package(object);
        if !top_level_package && !self.is_native(object) && !self.dependencies.contains(&object)
        {
            self.dependencies.push(object);
        }

        if self.ctx.is_export(object) {
            return;
        }
        let load = if graph.is_default_object(object) {
            ObjectFlags::LOAD_CONTEXT
        } else {
            load_flags_from_exclusions(flags)
        };
        let marks = self.ctx.marks_mut(object);
        marks.tag_imp = true;
        marks.load.insert(load);

        if let Some(outer) = graph.outer_of(object) {
            self.tag(outer);
        }
    }
}

impl Archive for ImportTagger<'_> {
    fn serialize_object(&mut self, object: Option<ObjectHandle>) {
        if std::mem::take(&mut self.cross_level_pending) {
            // Resolved by GUID at load time unless it is one of our exports.
            if let Some(target) = object {
                if !self.ctx.is_export(target) {
                    return;
                }
            }
        }
        if let Some(object) = object {
            self.tag(object);
        }
    }

    fn serialize_cross_level(&mut self, object: Option<ObjectHandle>) {
        self.cross_level_pending = true;
        self.serialize_object(object);
    }

    fn serialize_name(&mut self, name: NameId) {
        self.ctx.tag_name(name, self.context);
    }
}

/// Tag imports, dependencies and payload names of every export.
///
/// Each export is serialized together with its class and its archetype
/// (unless that is the class default). Returns the dependency list of each
/// export.
pub fn tag_imports(
    graph: &ObjectGraph,
    ctx: &mut SaveContext,
) -> HashMap<ObjectHandle, Vec<ObjectHandle>> {
    let exports: Vec<ObjectHandle> = graph.handles().filter(|h| ctx.is_export(*h)).collect();
    let mut dependencies = HashMap::with_capacity(exports.len());

    for export in exports {
        let class = graph.class_of(export);
        let context = if graph.has_flags(class, ObjectFlags::NATIVE) {
            ObjectFlags::LOAD_CONTEXT
        } else {
            ctx.load_flags(export)
        };

        let mut tagger = ImportTagger::new(graph, ctx, context);
        graph.serialize(export, &mut tagger);
        tagger.serialize_object(Some(class));
        if let Some(template) = graph.archetype_of(export) {
            if Some(template) != graph.default_object(class) {
                tagger.serialize_object(Some(template));
            }
        }
        dependencies.insert(export, tagger.into_dependencies());
    }

    debug!(
        imports = graph.handles().filter(|h| ctx.is_import(*h)).count(),
        "tagged imports"
    );
    dependencies
}

/// Tag the names every table entry needs: each tagged object's name and its
/// outer's, plus class and class-package names for imports.
pub fn tag_object_names(graph: &ObjectGraph, ctx: &mut SaveContext) {
    ctx.tag_name(NameId::NONE, ObjectFlags::LOAD_CONTEXT);
    for object in ctx.tagged(graph) {
        let mut names = vec![graph.object(object).name];
        if let Some(outer) = graph.outer_of(object) {
            names.push(graph.object(outer).name);
        }
        if ctx.is_import(object) {
            let class = graph.class_of(object);
            names.push(graph.object(class).name);
            if let Some(class_outer) = graph.outer_of(class) {
                names.push(graph.object(class_outer).name);
            }
        }
        for name in names {
            ctx.tag_name(name, ObjectFlags::LOAD_CONTEXT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulink_object::{PropertyValue, CORE_PACKAGE};

    struct Fixture {
        graph: ObjectGraph,
        pkg: ObjectHandle,
        class: ObjectHandle,
    }

    fn fixture() -> Fixture {
        let mut graph = ObjectGraph::new();
        let pkg = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let class = graph
            .create_class(pkg, "Thing", Some(object), ClassFlags::empty())
            .unwrap();
        Fixture { graph, pkg, class }
    }

    fn tag(f: &Fixture, base: ObjectHandle) -> LinkResult<SaveContext> {
        let mut ctx = SaveContext::new();
        clear_marks(&f.graph, &mut ctx, f.pkg);
        tag_package_exports(&f.graph, &mut ctx, f.pkg, Some(base), ObjectFlags::empty())?;
        Ok(ctx)
    }

    #[test]
    fn base_pulls_in_class_default_and_referenced_objects() {
        let mut f = fixture();
        let a = f.graph.create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC).unwrap();
        let b = f.graph.create_object(f.class, f.pkg, "B", ObjectFlags::PUBLIC).unwrap();
        let unreferenced = f.graph.create_object(f.class, f.pkg, "C", ObjectFlags::PUBLIC).unwrap();
        f.graph.set_property(a, "Next", PropertyValue::Object(Some(b))).unwrap();

        let ctx = tag(&f, a).unwrap();
        assert!(ctx.is_export(a));
        assert!(ctx.is_export(b));
        assert!(ctx.is_export(f.class));
        assert!(ctx.is_export(f.graph.default_object(f.class).unwrap()));
        assert!(!ctx.is_export(unreferenced));
        assert!(!ctx.is_export(f.pkg));
    }

    #[test]
    fn default_objects_load_everywhere() {
        let mut f = fixture();
        let a = f
            .graph
            .create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC | ObjectFlags::NOT_FOR_SERVER)
            .unwrap();
        let ctx = tag(&f, a).unwrap();
        assert_eq!(
            ctx.load_flags(a),
            ObjectFlags::LOAD_FOR_EDIT | ObjectFlags::LOAD_FOR_CLIENT
        );
        let cdo = f.graph.default_object(f.class).unwrap();
        assert_eq!(ctx.load_flags(cdo), ObjectFlags::LOAD_CONTEXT);
    }

    #[test]
    fn abstract_instances_are_transient_but_defaults_are_not() {
        let mut graph = ObjectGraph::new();
        let pkg = graph.create_package("Game").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let base = graph
            .create_class(pkg, "Base", Some(object), ClassFlags::ABSTRACT)
            .unwrap();
        let instance = graph.create_object(base, pkg, "Stray", ObjectFlags::PUBLIC).unwrap();

        let mut ctx = SaveContext::new();
        clear_marks(&graph, &mut ctx, pkg);
        assert!(ctx.is_transient(&graph, instance));
        assert!(!ctx.is_transient(&graph, graph.default_object(base).unwrap()));

        tag_package_exports(&graph, &mut ctx, pkg, Some(base), ObjectFlags::empty()).unwrap();
        assert!(!ctx.is_export(instance));
        assert!(ctx.is_export(graph.default_object(base).unwrap()));
    }

    #[test]
    fn deprecated_default_is_kept_with_its_class() {
        let mut graph = ObjectGraph::new();
        let pkg = graph.create_package("Game").unwrap();
        let component = graph.intrinsic_class("Component").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let old = graph
            .create_class(pkg, "Old", Some(object), ClassFlags::DEPRECATED | ClassFlags::HAS_COMPONENTS)
            .unwrap();
        let light = graph.create_class(pkg, "Light", Some(component), ClassFlags::empty()).unwrap();
        let instance = graph.create_object(old, pkg, "Stray", ObjectFlags::PUBLIC).unwrap();
        let part = graph.create_component(light, instance, "Part", None, "Part").unwrap();
        graph.set_property(instance, "Part", PropertyValue::Object(Some(part))).unwrap();

        let mut ctx = SaveContext::new();
        clear_marks(&graph, &mut ctx, pkg);
        assert!(ctx.is_transient(&graph, instance));
        assert!(ctx.is_transient(&graph, part));
        assert!(!ctx.is_transient(&graph, graph.default_object(old).unwrap()));
    }

    #[test]
    fn intrinsic_defaults_are_never_exported() {
        let graph = ObjectGraph::new();
        let core = graph.core_package();
        let object = graph.intrinsic_class("Object").unwrap();
        let mut ctx = SaveContext::new();
        clear_marks(&graph, &mut ctx, core);
        tag_package_exports(&graph, &mut ctx, core, Some(object), ObjectFlags::empty()).unwrap();
        assert!(ctx.is_export(object));
        assert!(!ctx.is_export(graph.default_object(object).unwrap()));
        assert_eq!(graph.name(core), CORE_PACKAGE);
    }

    #[test]
    fn foreign_template_that_skips_a_context_is_rejected() {
        let mut f = fixture();
        let other = f.graph.create_package("Shared").unwrap();
        let template = f
            .graph
            .create_object(
                f.class,
                other,
                "Template",
                ObjectFlags::PUBLIC | ObjectFlags::ARCHETYPE_OBJECT | ObjectFlags::NOT_FOR_CLIENT,
            )
            .unwrap();
        let a = f.graph.create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC).unwrap();
        f.graph.set_archetype(a, Some(template)).unwrap();

        let err = tag(&f, a).unwrap_err();
        match err {
            LinkError::MismatchedLoadFlags { flags, kind, .. } => {
                assert_eq!(flags, "LOAD_FOR_CLIENT");
                assert_eq!(kind, "object archetype");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn local_template_inherits_derived_load_flags() {
        let mut f = fixture();
        let template = f
            .graph
            .create_object(
                f.class,
                f.pkg,
                "Template",
                ObjectFlags::PUBLIC | ObjectFlags::ARCHETYPE_OBJECT | ObjectFlags::NOT_FOR_CLIENT,
            )
            .unwrap();
        let a = f.graph.create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC).unwrap();
        f.graph.set_archetype(a, Some(template)).unwrap();

        let ctx = tag(&f, a).unwrap();
        assert!(ctx.load_flags(template).contains(ObjectFlags::LOAD_FOR_CLIENT));
    }

    #[test]
    fn imports_and_dependencies_skip_native_and_packages() {
        let mut f = fixture();
        let other = f.graph.create_package("Shared").unwrap();
        let foreign = f.graph.create_object(f.class, other, "Foreign", ObjectFlags::PUBLIC).unwrap();
        let a = f.graph.create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC).unwrap();
        f.graph.set_property(a, "Ref", PropertyValue::Object(Some(foreign))).unwrap();

        let mut ctx = tag(&f, a).unwrap();
        let deps = tag_imports(&f.graph, &mut ctx);

        assert!(ctx.is_import(foreign));
        assert!(ctx.is_import(other));
        assert!(!ctx.is_export(foreign));
        let a_deps = &deps[&a];
        assert!(a_deps.contains(&foreign));
        assert!(a_deps.contains(&f.class));
        assert!(!a_deps.contains(&other));
        // The intrinsic Object class is native.
        let object = f.graph.intrinsic_class("Object").unwrap();
        assert!(!deps[&f.class].contains(&object));
        assert!(ctx.is_import(object));
    }

    #[test]
    fn cross_level_targets_are_not_imported() {
        let mut f = fixture();
        let level = f.graph.create_package("OtherLevel").unwrap();
        let target = f.graph.create_object(f.class, level, "Door", ObjectFlags::PUBLIC).unwrap();
        let a = f.graph.create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC).unwrap();
        f.graph
            .set_property(a, "Link", PropertyValue::CrossLevel(Some(target)))
            .unwrap();

        let mut ctx = tag(&f, a).unwrap();
        let deps = tag_imports(&f.graph, &mut ctx);
        assert!(!ctx.is_import(target));
        assert!(!deps[&a].contains(&target));
    }

    #[test]
    fn names_cover_tables_and_payloads() {
        let mut f = fixture();
        let a = f.graph.create_object(f.class, f.pkg, "A", ObjectFlags::PUBLIC).unwrap();
        f.graph.set_property(a, "Count", PropertyValue::Int(3)).unwrap();

        let mut ctx = tag(&f, a).unwrap();
        tag_imports(&f.graph, &mut ctx);
        tag_object_names(&f.graph, &mut ctx);

        for text in ["A", "Game", "Count", "None", "Thing", "Object", "Core", "Class"] {
            let id = f.graph.names().find(text).unwrap();
            assert!(ctx.is_name_tagged(id), "{text} not tagged");
        }
    }
}
