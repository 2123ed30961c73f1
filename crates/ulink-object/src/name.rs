use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Interned name. The ordinal is the interning order inside a [`NamePool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameId(u32);

impl NameId {
    /// The `None` name, always interned first.
    pub const NONE: NameId = NameId(0);

    /// Interning ordinal. Names sort by this, not by their text.
    pub fn ordinal(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Debug for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameId({})", self.0)
    }
}

/// Case-insensitive name table.
///
/// The first spelling interned wins; later lookups with different casing
/// return the same [`NameId`].
#[derive(Clone, Debug)]
pub struct NamePool {
    entries: Vec<String>,
    lookup: HashMap<String, NameId>,
}

impl NamePool {
    /// Create a pool holding only `None`.
    pub fn new() -> Self {
        let mut pool = Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
        };
        pool.intern("None");
        pool
    }

    /// Return the id for `text`, interning it if needed.
    pub fn intern(&mut self, text: &str) -> NameId {
        let key = text.to_ascii_lowercase();
        if let Some(id) = self.lookup.get(&key) {
            return *id;
        }
        let id = NameId(self.entries.len() as u32);
        self.entries.push(text.to_string());
        self.lookup.insert(key, id);
        id
    }

    /// Look up a name without interning.
    pub fn find(&self, text: &str) -> Option<NameId> {
        self.lookup.get(&text.to_ascii_lowercase()).copied()
    }

    /// Text of an interned name.
    pub fn get(&self, id: NameId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(String::as_str)
    }

    /// Text of an interned name, or `"None"` for ids from a different pool.
    pub fn resolve(&self, id: NameId) -> &str {
        self.get(id).unwrap_or("None")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All names in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (NameId, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, s)| (NameId(i as u32), s.as_str()))
    }
}

impl Default for NamePool {
    fn default() -> Self {
        Self::new()
    }
}
