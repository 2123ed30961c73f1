//! Error types for object graph construction.

use crate::handle::ObjectHandle;

/// Errors raised while building or mutating an [`ObjectGraph`](crate::ObjectGraph).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A handle does not belong to this graph.
    #[error("unknown object handle: {0:?}")]
    UnknownObject(ObjectHandle),

    /// The object was expected to be a class.
    #[error("{0} is not a class")]
    NotAClass(String),

    /// The object was expected to be a struct-like node (struct, function, state, class).
    #[error("{0} is not a struct")]
    NotAStruct(String),

    /// The object was expected to be a package.
    #[error("{0} is not a package")]
    NotAPackage(String),

    /// An object with the same name already lives in the same outer.
    #[error("duplicate object {name} in {outer}")]
    DuplicateObject {
        /// Path of the outer (or `<root>` for top-level packages).
        outer: String,
        /// The clashing name.
        name: String,
    },
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
