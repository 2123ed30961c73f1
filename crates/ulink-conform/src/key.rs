use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Full object name compared without regard to ASCII case.
///
/// Keeps the original spelling for display; equality, hashing and ordering
/// use the folded form.
#[derive(Clone)]
pub struct FullNameKey {
    text: String,
    folded: String,
}

impl FullNameKey {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let folded = text.to_ascii_lowercase();
        Self { text, folded }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for FullNameKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for FullNameKey {}

impl Hash for FullNameKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for FullNameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FullNameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl fmt::Debug for FullNameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FullNameKey({:?})", self.text)
    }
}

impl fmt::Display for FullNameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for FullNameKey {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for FullNameKey {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_case() {
        assert_eq!(FullNameKey::new("Class Game.Hero"), FullNameKey::new("class game.HERO"));
        let set: HashSet<_> = ["StaticMesh Pkg.A", "staticmesh pkg.a"]
            .into_iter()
            .map(FullNameKey::new)
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn ordering_ignores_case() {
        assert!(FullNameKey::new("apple") < FullNameKey::new("Banana"));
        assert!(FullNameKey::new("Zebra") > FullNameKey::new("aardvark"));
    }

    #[test]
    fn display_keeps_spelling() {
        assert_eq!(FullNameKey::new("Class Game.Hero").to_string(), "Class Game.Hero");
    }
}
