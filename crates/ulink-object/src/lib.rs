//! In-memory object graph consumed by the ulink package linker.
//!
//! The linker never owns objects. It walks an [`ObjectGraph`], an arena of
//! [`ObjectRecord`]s addressed by [`ObjectHandle`], and asks each node to
//! route itself through an [`Archive`]. Different consumers (the reachability
//! tagger, the dependency sorter, the payload writer) implement `Archive` and
//! observe the same object references in the same order.
//!
//! # Key Types
//!
//! - [`ObjectHandle`] -- Arena index of a node
//! - [`Guid`] -- 128-bit identifier for packages and cross-level references
//! - [`NameId`] / [`NamePool`] -- Case-insensitively interned names
//! - [`ObjectGraph`] -- Arena with the bootstrapped `Core` package
//! - [`ObjectKind`] -- Tagged node variants (package, struct, field, component, redirector)
//! - [`Archive`] -- Visitor interface every variant serializes itself into

pub mod archive;
pub mod error;
pub mod flags;
pub mod graph;
pub mod handle;
pub mod name;
pub mod object;

pub use archive::{Archive, Reference};
pub use error::{GraphError, GraphResult};
pub use flags::{ClassFlags, FunctionFlags, ObjectFlags, PackageFlags, PropertyFlags};
pub use graph::{ObjectGraph, CORE_PACKAGE};
pub use handle::{Guid, ObjectHandle};
pub use name::{NameId, NamePool};
pub use object::{
    ClassData, ComponentData, FieldData, FieldKind, LevelGuids, ObjectKind, ObjectRecord,
    PackageData, Property, PropertyType, PropertyValue, RedirectorData, StructData, StructKind,
    Thumbnail,
};
