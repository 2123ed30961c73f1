//! Cross-level references: properties that may point into another level
//! package and are resolved by GUID instead of through the import table.

use tracing::debug;
use ulink_object::{Guid, LevelGuids, ObjectGraph, ObjectHandle, PackageFlags};

use crate::context::SaveContext;

/// GUID tables a package will be saved with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrossLevelTables {
    /// GUIDs referenced in other levels, grouped by level name.
    pub import_guids: Vec<LevelGuids>,
    /// GUIDs of objects in this package that other levels reference.
    pub export_guids: Vec<(Guid, ObjectHandle)>,
}

/// Drop import GUID groups that no longer need to be kept: groups with no
/// level name, and groups for a map package that is currently loaded (its
/// references will be collected again by the scan).
pub fn prune_import_guids(graph: &ObjectGraph, groups: &mut Vec<LevelGuids>) {
    groups.retain(|group| {
        if group.level_name.is_empty() || group.level_name.eq_ignore_ascii_case("None") {
            return false;
        }
        let loaded_map = graph
            .find_object(None, &group.level_name)
            .and_then(|level| graph.package_data(level))
            .is_some_and(|data| data.flags.contains(PackageFlags::CONTAINS_MAP));
        !loaded_map
    });
}

/// Collect every cross-level reference that enters or leaves `package`,
/// assigning GUIDs through the context, and merge them into the tables the
/// package already carries.
pub fn scan_cross_level(
    graph: &ObjectGraph,
    ctx: &mut SaveContext,
    package: ObjectHandle,
) -> CrossLevelTables {
    let mut tables = CrossLevelTables::default();
    if let Some(data) = graph.package_data(package) {
        tables.import_guids = data.import_guids.clone();
        tables.export_guids = data.export_guids.clone();
    }
    prune_import_guids(graph, &mut tables.import_guids);

    let mut imports = 0usize;
    let mut exports = 0usize;
    for object in graph.handles() {
        let source_level = graph.outermost(object);
        for reference in graph.references(object) {
            if !reference.cross_level {
                continue;
            }
            let target_level = graph.outermost(reference.target);
            if target_level == source_level {
                continue;
            }

            if source_level == package {
                let guid = ctx.cross_level_guid(reference.target);
                let level_name = graph.name(target_level);
                let group = match tables
                    .import_guids
                    .iter()
                    .position(|g| g.level_name.eq_ignore_ascii_case(level_name))
                {
                    Some(index) => &mut tables.import_guids[index],
                    None => {
                        tables.import_guids.push(LevelGuids {
                            level_name: level_name.to_string(),
                            guids: Vec::new(),
                        });
                        let last = tables.import_guids.len() - 1;
                        &mut tables.import_guids[last]
                    }
                };
                if !group.guids.contains(&guid) {
                    group.guids.push(guid);
                    imports += 1;
                }
            } else if target_level == package {
                let guid = ctx.cross_level_guid(reference.target);
                match tables.export_guids.iter_mut().find(|(g, _)| *g == guid) {
                    Some(entry) => entry.1 = reference.target,
                    None => {
                        tables.export_guids.push((guid, reference.target));
                        exports += 1;
                    }
                }
            }
        }
    }

    debug!(imports, exports, "scanned cross-level references");
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulink_object::{ClassFlags, ObjectFlags, PropertyValue};

    fn graph() -> (ObjectGraph, ObjectHandle, ObjectHandle, ObjectHandle) {
        let mut graph = ObjectGraph::new();
        let here = graph.create_package("Here").unwrap();
        let there = graph.create_package("There").unwrap();
        let object = graph.intrinsic_class("Object").unwrap();
        let class = graph
            .create_class(here, "Door", Some(object), ClassFlags::empty())
            .unwrap();
        (graph, here, there, class)
    }

    #[test]
    fn outgoing_references_become_import_guids() {
        let (mut graph, here, there, class) = graph();
        let target = graph.create_object(class, there, "Exit", ObjectFlags::PUBLIC).unwrap();
        let source = graph.create_object(class, here, "Entry", ObjectFlags::PUBLIC).unwrap();
        graph
            .set_property(source, "Link", PropertyValue::CrossLevel(Some(target)))
            .unwrap();

        let mut ctx = SaveContext::new();
        let tables = scan_cross_level(&graph, &mut ctx, here);
        assert_eq!(tables.import_guids.len(), 1);
        assert_eq!(tables.import_guids[0].level_name, "There");
        assert_eq!(
            tables.import_guids[0].guids,
            vec![ctx.find_cross_level_guid(target).unwrap()]
        );
        assert!(tables.export_guids.is_empty());

        // Saving the other side records the same GUID as an export.
        let there_tables = scan_cross_level(&graph, &mut ctx, there);
        assert_eq!(there_tables.export_guids, vec![(tables.import_guids[0].guids[0], target)]);
    }

    #[test]
    fn same_level_references_are_ignored() {
        let (mut graph, here, _, class) = graph();
        let a = graph.create_object(class, here, "A", ObjectFlags::PUBLIC).unwrap();
        let b = graph.create_object(class, here, "B", ObjectFlags::PUBLIC).unwrap();
        graph.set_property(a, "Link", PropertyValue::CrossLevel(Some(b))).unwrap();
        let mut ctx = SaveContext::new();
        assert_eq!(scan_cross_level(&graph, &mut ctx, here), CrossLevelTables::default());
    }

    #[test]
    fn stale_groups_are_pruned() {
        let (mut graph, _, there, _) = graph();
        graph.package_data_mut(there).unwrap().flags = PackageFlags::CONTAINS_MAP;
        let mut groups = vec![
            LevelGuids { level_name: String::new(), guids: vec![Guid::new()] },
            LevelGuids { level_name: "There".into(), guids: vec![Guid::new()] },
            LevelGuids { level_name: "Unloaded".into(), guids: vec![Guid::new()] },
        ];
        prune_import_guids(&graph, &mut groups);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].level_name, "Unloaded");
    }
}
