use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::debug;

/// A table after conforming.
///
/// `entries[..sort_start]` mirror the old table slot for slot; `None` marks
/// an old entry that no longer exists. Entries from `sort_start` on are new
/// and still need [`sort_tail_by_key`](Self::sort_tail_by_key).
#[derive(Clone, Debug, PartialEq)]
pub struct Conformed<T> {
    entries: Vec<Option<T>>,
    sort_start: usize,
    placeholders: usize,
}

impl<T> Conformed<T> {
    /// A table with no prior version: everything is sortable.
    pub fn unconformed(entries: Vec<T>) -> Self {
        Self {
            entries: entries.into_iter().map(Some).collect(),
            sort_start: 0,
            placeholders: 0,
        }
    }

    pub fn entries(&self) -> &[Option<T>] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Option<T>> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first entry that did not exist in the old table.
    pub fn sort_start(&self) -> usize {
        self.sort_start
    }

    /// Number of old entries with no counterpart in the new table.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Sort the new tail by key. Placeholders in the tail sort last.
    pub fn sort_tail_by_key<K, F>(&mut self, key_of: F)
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let start = self.sort_start.min(self.entries.len());
        self.entries[start..].sort_by_cached_key(|entry| match entry {
            Some(item) => (false, Some(key_of(item))),
            None => (true, None),
        });
    }
}

/// Conform `new` against the keys of the old table.
///
/// Each new entry whose key appears in `old_keys` moves to that slot; old
/// keys with no new entry leave a `None` placeholder; the remaining new
/// entries follow in their original order. When a key occurs more than once
/// in `new`, the last occurrence is the one matched.
pub fn conform_with_placeholders<T, K, F>(old_keys: &[K], new: Vec<T>, key_of: F) -> Conformed<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut by_key: HashMap<K, usize> = HashMap::with_capacity(new.len());
    for (index, item) in new.iter().enumerate() {
        by_key.insert(key_of(item), index);
    }

    let mut pending: Vec<Option<T>> = new.into_iter().map(Some).collect();
    let mut entries = Vec::with_capacity(old_keys.len().max(pending.len()));
    let mut placeholders = 0;

    for key in old_keys {
        let matched = by_key
            .get(key)
            .and_then(|&index| pending.get_mut(index))
            .and_then(Option::take);
        if matched.is_none() {
            placeholders += 1;
        }
        entries.push(matched);
    }

    let sort_start = entries.len();
    entries.extend(pending.into_iter().flatten().map(Some));
    debug!(
        old = old_keys.len(),
        new = entries.len() - sort_start,
        placeholders,
        "conformed table"
    );

    Conformed {
        entries,
        sort_start,
        placeholders,
    }
}

/// Conform a table whose old entries must all survive (the name table).
///
/// The result starts with every old entry, followed by each new entry not
/// already present.
pub fn conform_preserving<K>(old: &[K], new: &[K]) -> Conformed<K>
where
    K: Eq + Hash + Clone,
{
    let mut seen: HashSet<&K> = old.iter().collect();
    let mut entries: Vec<Option<K>> = old.iter().cloned().map(Some).collect();
    let sort_start = entries.len();
    for key in new {
        if seen.insert(key) {
            entries.push(Some(key.clone()));
        }
    }
    Conformed {
        entries,
        sort_start,
        placeholders: 0,
    }
}
