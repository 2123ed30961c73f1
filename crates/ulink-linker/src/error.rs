use std::fmt;

use thiserror::Error;
use ulink_object::GraphError;

/// Why a tagged object may not be referenced from the package being saved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IllegalReason {
    /// The object is not public and lives outside the package.
    Private,
    /// The object lives in a different map package.
    OtherMap,
}

impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private object"),
            Self::OtherMap => write!(f, "object in another map"),
        }
    }
}

/// Diagnostic for a save aborted by an illegal reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IllegalReference {
    pub reason: IllegalReason,
    /// Full names of every offending object.
    pub objects: Vec<String>,
    /// Most likely referencer of the offending objects, if one was found.
    pub culprit: Option<String>,
    /// Slot through which the culprit holds the reference.
    pub property: Option<String>,
    /// Reference path from the save root to the first offending object.
    pub chain: Vec<String>,
}

impl fmt::Display for IllegalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph is linked to {}", self.reason)?;
        if let Some(first) = self.objects.first() {
            write!(f, " {first}")?;
            if self.objects.len() > 1 {
                write!(f, " (+{} more)", self.objects.len() - 1)?;
            }
        }
        match (&self.culprit, &self.property) {
            (Some(culprit), Some(property)) => write!(f, "; culprit {culprit} ({property})")?,
            (Some(culprit), None) => write!(f, "; culprit {culprit} (unknown property)")?,
            _ => write!(f, "; culprit unknown")?,
        }
        if !self.chain.is_empty() {
            write!(f, "; chain {}", self.chain.join(" -> "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    /// A save was started while another one is in progress.
    #[error("recursive package save of {0}")]
    RecursiveSave(String),

    /// The package was last saved by a newer format.
    #[error("package {0} was saved with a newer version")]
    VersionIncompatible(String),

    /// The package is not fully resident and no base object was given.
    #[error("package {0} is not fully loaded")]
    PartiallyLoadedSource(String),

    /// The conform source has replication metadata the new classes contradict.
    #[error("cannot conform to prior version: {}", mismatches.join(", "))]
    ConformIncompatibility { mismatches: Vec<String> },

    #[error("{0}")]
    IllegalReference(Box<IllegalReference>),

    /// An object would load in a context where its foreign template does not.
    #[error("mismatched load flags ({flags}) on {kind} from a different package: {object} cannot be derived from {template}")]
    MismatchedLoadFlags {
        flags: String,
        kind: &'static str,
        object: String,
        template: String,
    },

    /// An export force-loads an object that itself needs the export first.
    #[error("force-load cycle: {object} needs {target} ({relation}) before {target} can be placed")]
    ForceLoadCycle {
        object: String,
        relation: String,
        target: String,
    },

    /// A recorded dependency has no import or export index.
    #[error("no package index for dependency {dependency} of {object}")]
    UnresolvedDependency { object: String, dependency: String },

    /// A serialized name was never tagged into the name table.
    #[error("name not mapped: {0}")]
    NameNotMapped(String),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("invalid package tag: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("unsupported package version: {0}")]
    UnsupportedVersion(u32),

    #[error("corrupt package at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IllegalReference> for LinkError {
    fn from(reference: IllegalReference) -> Self {
        Self::IllegalReference(Box::new(reference))
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_reference_message_names_chain() {
        let err = LinkError::from(IllegalReference {
            reason: IllegalReason::Private,
            objects: vec!["Thing Other.B".into()],
            culprit: Some("Thing Game.A".into()),
            property: Some("Target".into()),
            chain: vec!["Game.R".into(), "Game.A".into(), "Other.B".into()],
        });
        let msg = err.to_string();
        assert!(msg.contains("private object Thing Other.B"));
        assert!(msg.contains("culprit Thing Game.A (Target)"));
        assert!(msg.contains("Game.R -> Game.A -> Other.B"));
    }

    #[test]
    fn magic_is_hex() {
        let err = LinkError::InvalidMagic {
            expected: 0x9E2A83C1,
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "invalid package tag: expected 0x9e2a83c1, got 0x00000000"
        );
    }
}
