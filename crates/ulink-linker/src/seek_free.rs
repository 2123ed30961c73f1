//! Physical export order for seek-free loading.

use std::collections::HashMap;

use tracing::{debug, error, warn};
use ulink_object::{ObjectGraph, ObjectHandle};
use ulink_sort::DependencySorter;

use crate::error::{LinkError, LinkResult};
use crate::tables::ObjectExport;

/// Reorder `exports[first_sort_index..]` so that every export comes after
/// the objects its creation force-loads.
///
/// Classes are sorted first, each with its fields, super chain and default
/// object, then every other export. One sorter serves all roots, so an
/// object reached from an earlier root is not emitted again. Exports the
/// sorter never reaches keep their relative order behind the sorted ones,
/// and placeholders go last.
///
/// Fails with [`LinkError::ForceLoadCycle`] when an export's archetype (or
/// component source) needs the export itself first, for example two objects
/// that are each other's archetype. No seek-free order exists then.
///
/// # Panics
///
/// With `verify` set, panics if the sorter's order breaks a force-load
/// dependency for any other reason.
pub fn seek_free_order(
    graph: &ObjectGraph,
    mut exports: Vec<ObjectExport>,
    first_sort_index: usize,
    verify: bool,
) -> LinkResult<Vec<ObjectExport>> {
    let first = first_sort_index.min(exports.len());
    let tail = exports.split_off(first);

    let mut slots: HashMap<ObjectHandle, usize> = HashMap::with_capacity(tail.len());
    for (slot, export) in tail.iter().enumerate() {
        if let Some(object) = export.object {
            slots.insert(object, slot);
        }
    }
    let roots: Vec<ObjectHandle> = tail.iter().filter_map(|e| e.object).collect();

    let mut sorter = DependencySorter::new(graph);
    let mut order = Vec::with_capacity(tail.len());
    let mut include_core = true;
    let mut collect = |sorter: &mut DependencySorter<'_>| -> LinkResult<()> {
        if let Some(cycle) = sorter.cycles().first() {
            let err = LinkError::ForceLoadCycle {
                object: graph.full_name(cycle.source),
                relation: cycle.relation.to_string(),
                target: graph.full_name(cycle.target),
            };
            error!("{err}");
            return Err(err);
        }
        if verify {
            sorter.assert_sorted();
        }
        order.extend(sorter.export_list(include_core));
        include_core = false;
        Ok(())
    };

    for &class in roots.iter().filter(|h| graph.is_class(**h)) {
        sorter.clear();
        sorter.process_struct(class);
        collect(&mut sorter)?;
    }
    for &object in roots.iter().filter(|h| !graph.is_class(**h)) {
        sorter.clear();
        sorter.process_object(Some(object));
        collect(&mut sorter)?;
    }

    let mut pending: Vec<Option<ObjectExport>> = tail.into_iter().map(Some).collect();
    for object in order {
        if let Some(&slot) = slots.get(&object) {
            if let Some(export) = pending[slot].take() {
                exports.push(export);
            }
        }
    }

    let mut placeholders = Vec::new();
    for export in pending.into_iter().flatten() {
        match export.object {
            Some(object) => {
                warn!(export = %graph.full_name(object), "export not reached by dependency sort");
                exports.push(export);
            }
            None => placeholders.push(export),
        }
    }
    exports.extend(placeholders);

    debug!(exports = exports.len(), first_sort_index = first, "seek-free export order");
    Ok(exports)
}
