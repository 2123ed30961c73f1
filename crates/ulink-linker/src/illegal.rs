//! Detection and diagnosis of references a package may not hold.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{error, warn};
use ulink_object::{ObjectFlags, ObjectGraph, ObjectHandle, PackageFlags};

use crate::context::SaveContext;
use crate::error::{IllegalReason, IllegalReference};

/// Imports that may not be referenced: non-public objects, or objects that
/// live inside a different map package.
///
/// Objects in other maps take precedence: when any exist, the private list
/// is not reported.
pub fn find_illegal_imports(
    graph: &ObjectGraph,
    ctx: &SaveContext,
    package: ObjectHandle,
) -> Option<(IllegalReason, Vec<ObjectHandle>)> {
    let mut private = Vec::new();
    let mut other_maps = Vec::new();

    for object in graph.handles().filter(|h| ctx.is_import(*h)) {
        if !graph.has_flags(object, ObjectFlags::PUBLIC) {
            private.push(object);
        }
        let outermost = graph.outermost(object);
        let in_map = graph
            .package_data(outermost)
            .is_some_and(|data| data.flags.contains(PackageFlags::CONTAINS_MAP));
        if in_map && outermost != object && outermost != package {
            other_maps.push(object);
        }
    }

    if !other_maps.is_empty() {
        Some((IllegalReason::OtherMap, other_maps))
    } else if !private.is_empty() {
        Some((IllegalReason::Private, private))
    } else {
        None
    }
}

/// Scan tagged objects for the most likely holder of a reference to one of
/// `bad`. Returns the referencer and the slot of the last one found.
pub fn most_likely_culprit(
    graph: &ObjectGraph,
    ctx: &SaveContext,
    bad: &[ObjectHandle],
) -> Option<(ObjectHandle, String)> {
    let mut culprit = None;
    for &target in bad {
        warn!(object = %graph.full_name(target), "referencers of illegal object");
        for referencer in ctx.tagged(graph) {
            let slots: Vec<String> = graph
                .references(referencer)
                .into_iter()
                .filter(|r| r.target == target)
                .map(|r| r.slot)
                .collect();
            if let Some(slot) = slots.last() {
                warn!(
                    referencer = %graph.full_name(referencer),
                    references = slots.len(),
                    slot = %slot,
                    "illegal reference"
                );
                culprit = Some((referencer, slot.clone()));
            }
        }
    }
    culprit
}

/// Shortest reference path from any root to the first object of `bad` that
/// can be reached, following payload references, classes and archetypes
/// through tagged objects.
pub fn reference_chain(
    graph: &ObjectGraph,
    ctx: &SaveContext,
    roots: &[ObjectHandle],
    bad: &[ObjectHandle],
) -> Vec<ObjectHandle> {
    let targets: HashSet<ObjectHandle> = bad.iter().copied().collect();
    let mut parent: HashMap<ObjectHandle, Option<ObjectHandle>> = HashMap::new();
    let mut queue = VecDeque::new();
    for &root in roots {
        if parent.insert(root, None).is_none() {
            queue.push_back(root);
        }
    }

    while let Some(current) = queue.pop_front() {
        if targets.contains(&current) {
            let mut chain = vec![current];
            let mut step = parent.get(&current).copied().flatten();
            while let Some(previous) = step {
                chain.push(previous);
                step = parent.get(&previous).copied().flatten();
            }
            chain.reverse();
            return chain;
        }

        let mut next: Vec<ObjectHandle> = graph
            .references(current)
            .into_iter()
            .map(|r| r.target)
            .collect();
        next.push(graph.class_of(current));
        next.extend(graph.archetype_of(current));
        for target in next {
            let tagged = ctx.is_export(target) || ctx.is_import(target);
            if tagged && !parent.contains_key(&target) {
                parent.insert(target, Some(current));
                queue.push_back(target);
            }
        }
    }
    Vec::new()
}

/// Build the diagnostic for an aborted save, logging it.
pub fn diagnose(
    graph: &ObjectGraph,
    ctx: &SaveContext,
    roots: &[ObjectHandle],
    reason: IllegalReason,
    bad: &[ObjectHandle],
) -> IllegalReference {
    let culprit = most_likely_culprit(graph, ctx, bad);
    let chain = reference_chain(graph, ctx, roots, bad);
    let report = IllegalReference {
        reason,
        objects: bad.iter().map(|h| graph.full_name(*h)).collect(),
        culprit: culprit.as_ref().map(|(h, _)| graph.full_name(*h)),
        property: culprit.map(|(_, slot)| slot),
        chain: chain.iter().map(|h| graph.path_name(*h, None)).collect(),
    };
    error!("{report}");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::{clear_marks, tag_imports, tag_package_exports};
    use ulink_object::{ClassFlags, PropertyValue};

    struct Fixture {
        graph: ObjectGraph,
        game: ObjectHandle,
        other: ObjectHandle,
        class: ObjectHandle,
    }

    fn fixture() -> Fixture {
        let mut graph = ObjectGraph::new();
        let game = graph.create_package("Game").unwrap();
        let other = graph.create_package("Other").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let class = graph
            .create_class(game, "Thing", Some(object), ClassFlags::empty())
            .unwrap();
        Fixture {
            graph,
            game,
            other,
            class,
        }
    }

    fn tag(f: &Fixture, root: ObjectHandle) -> SaveContext {
        let mut ctx = SaveContext::new();
        clear_marks(&f.graph, &mut ctx, f.game);
        tag_package_exports(&f.graph, &mut ctx, f.game, Some(root), ObjectFlags::empty()).unwrap();
        tag_imports(&f.graph, &mut ctx);
        ctx
    }

    #[test]
    fn private_import_with_chain_and_culprit() {
        let mut f = fixture();
        let r = f.graph.create_object(f.class, f.game, "R", ObjectFlags::PUBLIC).unwrap();
        let a = f.graph.create_object(f.class, f.game, "A", ObjectFlags::PUBLIC).unwrap();
        let b = f.graph.create_object(f.class, f.other, "B", ObjectFlags::empty()).unwrap();
        f.graph.set_property(r, "Child", PropertyValue::Object(Some(a))).unwrap();
        f.graph.set_property(a, "Secret", PropertyValue::Object(Some(b))).unwrap();

        let ctx = tag(&f, r);
        let (reason, bad) = find_illegal_imports(&f.graph, &ctx, f.game).unwrap();
        assert_eq!(reason, IllegalReason::Private);
        assert_eq!(bad, vec![b]);

        let report = diagnose(&f.graph, &ctx, &[r], reason, &bad);
        assert_eq!(report.chain, vec!["Game.R", "Game.A", "Other.B"]);
        assert_eq!(report.culprit.as_deref(), Some("Thing Game.A"));
        assert_eq!(report.property.as_deref(), Some("Secret"));
    }

    #[test]
    fn other_map_wins_over_private() {
        let mut f = fixture();
        f.graph.package_data_mut(f.other).unwrap().flags = PackageFlags::CONTAINS_MAP;
        let r = f.graph.create_object(f.class, f.game, "R", ObjectFlags::PUBLIC).unwrap();
        let actor = f.graph.create_object(f.class, f.other, "Actor", ObjectFlags::PUBLIC).unwrap();
        let hidden = f.graph.create_object(f.class, f.other, "Hidden", ObjectFlags::empty()).unwrap();
        f.graph.set_property(r, "Actor", PropertyValue::Object(Some(actor))).unwrap();
        f.graph.set_property(r, "Hidden", PropertyValue::Object(Some(hidden))).unwrap();

        let ctx = tag(&f, r);
        let (reason, bad) = find_illegal_imports(&f.graph, &ctx, f.game).unwrap();
        assert_eq!(reason, IllegalReason::OtherMap);
        assert_eq!(bad, vec![actor, hidden]);
    }

    #[test]
    fn public_imports_are_legal() {
        let mut f = fixture();
        let r = f.graph.create_object(f.class, f.game, "R", ObjectFlags::PUBLIC).unwrap();
        let shared = f.graph.create_object(f.class, f.other, "Shared", ObjectFlags::PUBLIC).unwrap();
        f.graph.set_property(r, "Shared", PropertyValue::Object(Some(shared))).unwrap();
        let ctx = tag(&f, r);
        assert!(find_illegal_imports(&f.graph, &ctx, f.game).is_none());
    }
}
