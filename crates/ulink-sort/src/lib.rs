//! Dependency sort for seek-free package loading.
//!
//! A loader that creates exports strictly in file order must never find that
//! an export's class, archetype or other force-loaded object lives further
//! ahead in the file. [`DependencySorter`] produces an order with that
//! property by inserting each object's requirements in front of it as they
//! are discovered, instead of appending.
//!
//! # Architecture
//!
//! ```text
//! process_struct / process_object
//!        │ mark processed, reserve insert index
//!        ▼
//! handle_dependency (class, outer, archetype, component/redirector extras)
//!        │ inserts requirements before the reserved index, advances it
//!        ▼
//! insert object, then serialize it through the sorter (Archive impl)
//! ```
//!
//! The intrinsic `Core` classes and their default objects are seeded first
//! and excluded from [`DependencySorter::export_list`] and verification.

pub mod sorter;
pub mod verify;

pub use sorter::{DependencySorter, ForceLoadCycle};
pub use verify::{ForceLoadRelation, SortViolation};
