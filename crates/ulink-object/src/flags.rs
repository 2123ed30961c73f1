//! Flag sets carried by objects, classes, packages and fields.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident: $repr:ty {
            $( $(#[$fmeta:meta])* const $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: Self = Self($value); )*

            /// No flags set.
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Wrap raw bits, keeping unknown bits intact.
            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            /// The raw bits.
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Returns `true` if every bit of `other` is set.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns `true` if any bit of `other` is set.
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            pub const fn intersection(self, other: Self) -> Self {
                Self(self.0 & other.0)
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            pub fn set(&mut self, other: Self, enabled: bool) {
                if enabled {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

flag_set! {
    /// Per-object flags. The low bits mirror what is persisted in an export entry.
    ObjectFlags: u64 {
        /// Visible outside its package; only public objects may be imported.
        const PUBLIC = 1 << 0;
        /// Never saved.
        const TRANSIENT = 1 << 1;
        /// Backed by native code.
        const NATIVE = 1 << 2;
        /// Kept alive without references.
        const STANDALONE = 1 << 3;
        const CLASS_DEFAULT_OBJECT = 1 << 4;
        /// Template for other instances.
        const ARCHETYPE_OBJECT = 1 << 5;
        /// Exported even when it lives outside the saved package.
        const FORCE_TAG_EXP = 1 << 6;
        const LOAD_FOR_CLIENT = 1 << 7;
        const LOAD_FOR_SERVER = 1 << 8;
        const LOAD_FOR_EDIT = 1 << 9;
        const NOT_FOR_CLIENT = 1 << 10;
        const NOT_FOR_SERVER = 1 << 11;
        const NOT_FOR_EDIT = 1 << 12;
        const PENDING_KILL = 1 << 13;
        /// Level-scoped object (lives inside a map package's level).
        const LEVEL_OBJECT = 1 << 14;
    }
}

impl ObjectFlags {
    /// The three load-context flags.
    pub const LOAD_CONTEXT: Self = Self(
        Self::LOAD_FOR_CLIENT.0 | Self::LOAD_FOR_SERVER.0 | Self::LOAD_FOR_EDIT.0,
    );

    /// Flags written to the export table.
    pub const PERSISTENT: Self = Self(
        Self::PUBLIC.0
            | Self::STANDALONE.0
            | Self::NATIVE.0
            | Self::CLASS_DEFAULT_OBJECT.0
            | Self::ARCHETYPE_OBJECT.0
            | Self::LOAD_CONTEXT.0
            | Self::NOT_FOR_CLIENT.0
            | Self::NOT_FOR_SERVER.0
            | Self::NOT_FOR_EDIT.0,
    );
}

flag_set! {
    /// Flags on class objects.
    ClassFlags: u32 {
        const ABSTRACT = 1 << 0;
        const DEPRECATED = 1 << 1;
        /// One of the bootstrap classes built by `ObjectGraph::new`.
        const INTRINSIC = 1 << 2;
        const NATIVE = 1 << 3;
        const HAS_COMPONENTS = 1 << 4;
        const INTERFACE = 1 << 5;
    }
}

flag_set! {
    /// Flags stored in a package summary.
    PackageFlags: u32 {
        const SERVER_SIDE_ONLY = 1 << 0;
        const CONTAINS_MAP = 1 << 1;
        const CONTAINS_SCRIPT = 1 << 2;
        const COOKED = 1 << 3;
        /// Payload is chunk-compressed on save.
        const STORE_COMPRESSED = 1 << 4;
        /// Loaded package was written by a newer file version.
        const SAVED_WITH_NEWER_VERSION = 1 << 5;
        const FILTER_EDITOR_ONLY = 1 << 6;
    }
}

flag_set! {
    /// Flags on property declarations.
    PropertyFlags: u64 {
        const EDIT = 1 << 0;
        const CONST = 1 << 1;
        const INPUT = 1 << 2;
        const EXPORT_OBJECT = 1 << 3;
        const OPTIONAL = 1 << 4;
        /// Replicated over the network.
        const NET = 0x20;
        const TRANSIENT = 1 << 13;
        /// Values may point into another level and are resolved by GUID.
        const CROSS_LEVEL = 1 << 24;
    }
}

flag_set! {
    /// Flags on function declarations.
    FunctionFlags: u64 {
        const FINAL = 1 << 0;
        const DEFINED = 1 << 1;
        const ITERATOR = 1 << 2;
        const LATENT = 1 << 3;
        const NET = 1 << 6;
        const NATIVE = 1 << 10;
        const EVENT = 1 << 11;
        const STATIC = 1 << 13;
        const NET_RELIABLE = 1 << 7;
        const NET_SERVER = 1 << 21;
        const NET_CLIENT = 1 << 24;
    }
}

impl FunctionFlags {
    /// Bits that describe replication; compared during conform validation.
    pub const NET_MASK: Self =
        Self(Self::NET.0 | Self::NET_RELIABLE.0 | Self::NET_SERVER.0 | Self::NET_CLIENT.0);
}
