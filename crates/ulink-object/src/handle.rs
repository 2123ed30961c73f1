use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to a node in an [`ObjectGraph`](crate::ObjectGraph).
///
/// Handles are arena indices and stay valid for the lifetime of the graph;
/// objects are never removed, only flagged pending-kill.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(u32);

impl ObjectHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({})", self.0)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 128-bit globally unique identifier.
///
/// Packages carry one in their summary; cross-level references are keyed by
/// one so a level can find its targets without an import entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Generate a new time-ordered GUID.
    pub fn new() -> Self {
        Self(*uuid::Uuid::now_v7().as_bytes())
    }

    /// The all-zero GUID. Represents "no GUID assigned".
    pub const fn zero() -> Self {
        Self([0u8; 16])
    }

    /// Build from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns `true` for the all-zero GUID.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }

    /// The raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.short_hex())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_guids_are_distinct() {
        let a = Guid::new();
        let b = Guid::new();
        assert_ne!(a, b);
        assert!(!a.is_zero());
    }

    #[test]
    fn zero_guid() {
        assert!(Guid::zero().is_zero());
        assert_eq!(Guid::default(), Guid::zero());
    }

    #[test]
    fn guid_hex_display() {
        let g = Guid::from_bytes([0xab; 16]);
        assert_eq!(g.to_hex().len(), 32);
        assert_eq!(g.short_hex(), "abababab");
        assert_eq!(format!("{g}"), g.to_hex());
    }

    #[test]
    fn handle_display() {
        let h = ObjectHandle::new(7);
        assert_eq!(h.index(), 7);
        assert_eq!(format!("{h}"), "#7");
        assert_eq!(format!("{h:?}"), "ObjectHandle(7)");
    }
}
