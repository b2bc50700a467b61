//! Property value index.

use crate::entry::{EntryId, Value};
use std::collections::{HashMap, HashSet};

/// Hash index from one property's values to the entries carrying them.
///
/// Lookups are exact matches only. The index is a hint: callers still
/// evaluate their predicate on every entry it returns.
#[derive(Debug, Clone)]
pub struct PropertyIndex {
    /// Indexed property name.
    property: String,
    /// Value to entry IDs mapping.
    entries: HashMap<Value, HashSet<EntryId>>,
    /// Total (value, entry) pair count.
    count: usize,
}

impl PropertyIndex {
    /// Creates an empty index for `property`.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            entries: HashMap::new(),
            count: 0,
        }
    }

    /// Returns the indexed property.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Adds `entry` under `value`. Returns false if it was already there.
    pub fn insert(&mut self, value: Value, entry: EntryId) -> bool {
        let inserted = self.entries.entry(value).or_default().insert(entry);
        if inserted {
            self.count += 1;
        }
        inserted
    }

    /// Removes `entry` from under `value`. Returns false if it was not there.
    pub fn remove(&mut self, value: &Value, entry: EntryId) -> bool {
        if let Some(set) = self.entries.get_mut(value) {
            if set.remove(&entry) {
                self.count -= 1;
                if set.is_empty() {
                    self.entries.remove(value);
                }
                return true;
            }
        }
        false
    }

    /// Returns the entries stored under `value`.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Vec<EntryId> {
        self.entries
            .get(value)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Checks whether any entry carries `value`.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.entries.contains_key(value)
    }

    /// Number of distinct indexed values.
    #[must_use]
    pub fn distinct_values(&self) -> usize {
        self.entries.len()
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }
}
