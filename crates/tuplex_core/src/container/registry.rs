//! Registry of live containers.

use super::Container;
use crate::error::{CoreError, CoreResult};
use crate::types::ContainerId;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Concurrent container ID to container map with a name index.
///
/// A container is in the registry from its creation until it is dropped,
/// whether or not its creating transaction committed yet. Visibility is
/// decided by the isolation manager.
#[derive(Debug)]
pub struct ContainerRegistry {
    next_id: AtomicU64,
    by_id: DashMap<ContainerId, Arc<Container>>,
    by_name: DashMap<String, ContainerId>,
}

impl ContainerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            by_id: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Allocates a fresh container ID.
    pub fn allocate_id(&self) -> ContainerId {
        ContainerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a container.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ContainerNameTaken`] if a live container has the
    /// same name.
    pub fn insert(&self, container: Arc<Container>) -> CoreResult<()> {
        if let Some(name) = container.name() {
            match self.by_name.entry(name.to_string()) {
                MapEntry::Occupied(_) => {
                    return Err(CoreError::ContainerNameTaken {
                        name: name.to_string(),
                    })
                }
                MapEntry::Vacant(slot) => {
                    slot.insert(container.id());
                }
            }
        }
        self.by_id.insert(container.id(), container);
        Ok(())
    }

    /// Returns the container with `id`.
    #[must_use]
    pub fn get(&self, id: ContainerId) -> Option<Arc<Container>> {
        self.by_id.get(&id).map(|c| Arc::clone(c.value()))
    }

    /// Returns the ID of the container named `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ContainerId> {
        self.by_name.get(name).map(|id| *id.value())
    }

    /// Removes a container and its name.
    pub fn remove(&self, id: ContainerId) -> Option<Arc<Container>> {
        let (_, container) = self.by_id.remove(&id)?;
        if let Some(name) = container.name() {
            self.by_name.remove_if(name, |_, owner| *owner == id);
        }
        Some(container)
    }

    /// Returns the IDs of all registered containers, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ContainerId> {
        let mut ids: Vec<ContainerId> = self.by_id.iter().map(|c| *c.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if no container is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
