//! Table conforming for the ulink package linker.
//!
//! When a package is saved "conformed" against an earlier version, every
//! table entry that already existed keeps its old index so that the two
//! files differ as little as possible. The functions here are independent of
//! the concrete table types; callers pass a key extractor.
//!
//! # Key Types
//!
//! - [`Conformed`] -- Table with placeholder slots and the start of the sortable tail
//! - [`FullNameKey`] -- Case-insensitive identity used for imports and exports
//! - [`conform_with_placeholders`] -- Import/export alignment
//! - [`conform_preserving`] -- Name table alignment (old entries are never dropped)

pub mod key;
pub mod table;

pub use key::FullNameKey;
pub use table::{conform_preserving, conform_with_placeholders, Conformed};
