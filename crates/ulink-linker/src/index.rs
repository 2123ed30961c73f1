use std::fmt;

use serde::{Deserialize, Serialize};

/// Signed reference into a package's tables.
///
/// `0` is null, `n > 0` is export `n - 1`, `n < 0` is import `-n - 1`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageIndex(i32);

impl PackageIndex {
    pub const NULL: Self = Self(0);

    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub fn from_export(index: usize) -> Self {
        Self(index as i32 + 1)
    }

    pub fn from_import(index: usize) -> Self {
        Self(-(index as i32) - 1)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn is_export(self) -> bool {
        self.0 > 0
    }

    pub fn is_import(self) -> bool {
        self.0 < 0
    }

    /// Zero-based export table slot.
    pub fn export_index(self) -> Option<usize> {
        self.is_export().then(|| self.0 as usize - 1)
    }

    /// Zero-based import table slot.
    pub fn import_index(self) -> Option<usize> {
        self.is_import().then(|| (-(self.0 as i64) - 1) as usize)
    }
}

impl fmt::Debug for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(i) = self.export_index() {
            write!(f, "Export({i})")
        } else if let Some(i) = self.import_index() {
            write!(f, "Import({i})")
        } else {
            write!(f, "Null")
        }
    }
}

impl fmt::Display for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
