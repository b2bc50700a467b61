//! Catalog of live stored maps.

use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryStoredMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::hash::Hash;
use std::sync::Arc;

/// Tracks which named maps currently exist.
///
/// Containers and coordinators create their maps through the catalog so
/// that map names stay unique and destroyed maps disappear from it. A map
/// removes itself from the catalog when it is destroyed.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tuplex_storage::{MapCatalog, StoredMap};
///
/// let catalog = Arc::new(MapCatalog::new());
/// let map = catalog.create_map::<u32, u32>("c1/entries").unwrap();
/// assert!(catalog.contains("c1/entries"));
///
/// map.destroy().unwrap();
/// assert!(!catalog.contains("c1/entries"));
/// ```
#[derive(Debug, Default)]
pub struct MapCatalog {
    names: RwLock<BTreeSet<String>>,
}

impl MapCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory map registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MapExists`] if a live map already uses the name.
    pub fn create_map<K, V>(self: &Arc<Self>, name: &str) -> StorageResult<InMemoryStoredMap<K, V>>
    where
        K: Eq + Hash,
    {
        let mut names = self.names.write();
        if !names.insert(name.to_string()) {
            return Err(StorageError::MapExists {
                name: name.to_string(),
            });
        }
        Ok(InMemoryStoredMap::with_catalog(
            name.to_string(),
            Arc::clone(self),
        ))
    }

    /// Checks whether a live map uses `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    /// Returns the names of all live maps, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }

    /// Returns the number of live maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Returns true if no map is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn forget(&self, name: &str) {
        self.names.write().remove(name);
    }
}
