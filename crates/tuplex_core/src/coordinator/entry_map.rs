//! Stored entry map shared by the map-backed coordinators.

use crate::entry::{Entry, EntryId};
use crate::error::CoreResult;
use std::fmt;
use std::sync::Arc;
use tuplex_storage::{MapCatalog, StorageTxn, StoredMap};

/// An entry ID to entry map on top of a [`StoredMap`].
pub struct EntryMap {
    map: Box<dyn StoredMap<EntryId, Entry>>,
}

impl EntryMap {
    /// Wraps a stored map.
    pub fn new(map: impl StoredMap<EntryId, Entry> + 'static) -> Self {
        Self { map: Box::new(map) }
    }

    /// Creates a map registered in `catalog` under `name`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a live map already uses the name.
    pub fn create(catalog: &Arc<MapCatalog>, name: &str) -> CoreResult<Self> {
        Ok(Self::new(catalog.create_map::<EntryId, Entry>(name)?))
    }

    /// Returns the stored map's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.map.name()
    }

    /// Stores an entry. Returns false if it was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn insert(&self, entry: &Entry, txn: Option<StorageTxn>) -> CoreResult<bool> {
        Ok(self.map.put(entry.id(), entry.clone(), txn)?.is_none())
    }

    /// Removes an entry, returning it.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn remove(&self, id: EntryId, txn: Option<StorageTxn>) -> CoreResult<Option<Entry>> {
        Ok(self.map.remove(&id, txn)?)
    }

    /// Returns the entry stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn get(&self, id: EntryId) -> CoreResult<Option<Entry>> {
        Ok(self.map.get(&id)?)
    }

    /// Checks whether `id` is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn contains(&self, id: EntryId) -> CoreResult<bool> {
        Ok(self.map.contains_key(&id)?)
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.map.len()?)
    }

    /// Returns true if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.map.is_empty()?)
    }

    /// Returns every stored entry, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn entries(&self) -> CoreResult<Vec<Entry>> {
        Ok(self.map.values()?)
    }

    /// Returns every stored entry ID.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn ids(&self) -> CoreResult<Vec<EntryId>> {
        Ok(self.map.keys()?)
    }

    /// Looks up `ids` in order, skipping IDs no longer stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn resolve<I>(&self, ids: I) -> CoreResult<Vec<Entry>>
    where
        I: IntoIterator<Item = EntryId>,
    {
        let mut entries = Vec::new();
        for id in ids {
            if let Some(entry) = self.map.get(&id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Drops the stored map.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn destroy(&self) -> CoreResult<()> {
        Ok(self.map.destroy()?)
    }

    /// Returns true once the map was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.map.is_destroyed()
    }
}

impl fmt::Debug for EntryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryMap")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
