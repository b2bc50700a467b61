//! Containers: entry stores with their coordinators.

mod registry;

pub use registry::ContainerRegistry;

use crate::coordinator::{
    CoordinationData, Coordinator, CoordinatorConfig, CoordinatorEnv, CoordinatorKind, EntryMap,
};
use crate::entry::{Entry, EntryId};
use crate::error::{CoreError, CoreResult};
use crate::isolation::IsolationManager;
use crate::selector::{Count, EntrySelector, Selector};
use crate::types::{ContainerId, SubTransactionId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use tuplex_storage::StorageTxn;

/// A named or anonymous bag of entries.
///
/// Every entry written into the container is stored in the container's own
/// entry map and registered with each coordinator, in configuration order.
/// Visibility of entries is decided by the isolation manager, not here: a
/// container holds pending writes of running transactions as well.
pub struct Container {
    id: ContainerId,
    name: Option<String>,
    max_size: Option<usize>,
    entries: EntryMap,
    coordinators: Vec<Arc<dyn Coordinator>>,
    /// Serializes registration, unregistration and destruction.
    write_gate: Mutex<()>,
}

impl Container {
    /// Builds a container and the storage of its coordinators.
    pub(crate) fn build(
        id: ContainerId,
        name: Option<String>,
        max_size: Option<usize>,
        coordinators: &[CoordinatorConfig],
        env: &CoordinatorEnv<'_>,
    ) -> CoreResult<Self> {
        let mut names = HashSet::new();
        if let Some(dup) = coordinators.iter().find(|c| !names.insert(c.name())) {
            return Err(CoreError::invalid_operation(format!(
                "duplicate coordinator name {} in {id}",
                dup.name()
            )));
        }

        let entries = EntryMap::create(env.catalog, &format!("{id}/entries"))?;
        let mut built: Vec<Arc<dyn Coordinator>> = Vec::with_capacity(coordinators.len());
        for config in coordinators {
            match config.build(id, env) {
                Ok(coordinator) => built.push(coordinator),
                Err(e) => {
                    for coordinator in &built {
                        if let Err(cleanup) = coordinator.destroy() {
                            warn!(
                                container = %id,
                                coordinator = coordinator.name(),
                                error = %cleanup,
                                "coordinator cleanup failed"
                            );
                        }
                    }
                    entries.destroy()?;
                    return Err(e);
                }
            }
        }

        Ok(Self {
            id,
            name,
            max_size,
            entries,
            coordinators: built,
            write_gate: Mutex::new(()),
        })
    }

    /// Returns the container ID.
    #[must_use]
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    /// Returns the container name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the maximum number of entries, if bounded.
    #[must_use]
    pub const fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Returns the coordinators in configuration order.
    #[must_use]
    pub fn coordinators(&self) -> &[Arc<dyn Coordinator>] {
        &self.coordinators
    }

    /// Returns the coordinator named `name`.
    #[must_use]
    pub fn coordinator(&self, name: &str) -> Option<&Arc<dyn Coordinator>> {
        self.coordinators.iter().find(|c| c.name() == name)
    }

    /// Returns true once the container was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.entries.is_destroyed()
    }

    /// Returns the number of stored entries, pending ones included.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the container was destroyed.
    pub fn len(&self) -> CoreResult<usize> {
        self.entries.len()
    }

    /// Returns true if no entry is stored.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the container was destroyed.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.entries.is_empty()
    }

    /// Returns a stored entry regardless of its visibility.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the container was destroyed.
    pub fn get(&self, entry: EntryId) -> CoreResult<Option<Entry>> {
        self.entries.get(entry)
    }

    /// Stores `entry` and registers it with every coordinator.
    ///
    /// If a coordinator rejects the entry, the coordinators that already
    /// accepted it are undone and the error is returned.
    ///
    /// # Errors
    ///
    /// [`CoreError::ContainerFull`] when the container is at its maximum,
    /// or whatever a coordinator rejects the entry with.
    pub fn register_entry(
        &self,
        stx: SubTransactionId,
        data: &[CoordinationData],
        entry: &Entry,
        isolation: &IsolationManager,
    ) -> CoreResult<()> {
        let _gate = self.write_gate.lock();
        if let Some(max_size) = self.max_size {
            if self.entries.len()? >= max_size {
                return Err(CoreError::ContainerFull {
                    container: self.id,
                    max_size,
                });
            }
        }

        let txn = Some(stx.storage_txn());
        self.entries.insert(entry, txn)?;
        for (done, coordinator) in self.coordinators.iter().enumerate() {
            if let Err(e) = coordinator.register_entry(stx, data, entry, isolation) {
                debug!(
                    container = %self.id,
                    coordinator = coordinator.name(),
                    entry = %entry.id(),
                    error = %e,
                    "registration rejected"
                );
                for accepted in &self.coordinators[..done] {
                    accepted.unregister_entry(entry.id(), txn)?;
                }
                self.entries.remove(entry.id(), txn)?;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Removes an entry from the store and every coordinator.
    ///
    /// Returns false if the entry was not stored or the container is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool> {
        let _gate = self.write_gate.lock();
        if self.entries.is_destroyed() {
            return Ok(false);
        }
        for coordinator in &self.coordinators {
            coordinator.unregister_entry(entry, txn)?;
        }
        Ok(self.entries.remove(entry, txn)?.is_some())
    }

    /// Drops the entry map and every coordinator's storage.
    ///
    /// Returns the IDs of the entries that were stored. A second call
    /// returns nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn destroy(&self) -> CoreResult<Vec<EntryId>> {
        let _gate = self.write_gate.lock();
        if self.entries.is_destroyed() {
            return Ok(Vec::new());
        }
        let ids = self.entries.ids()?;
        for coordinator in &self.coordinators {
            coordinator.destroy()?;
        }
        self.entries.destroy()?;
        debug!(container = %self.id, entries = ids.len(), "container storage destroyed");
        Ok(ids)
    }

    /// Builds the runtime selector chain for `selectors`.
    ///
    /// Each selector runs on the coordinator it names, or on the first
    /// coordinator of its kind. An empty list selects one entry through the
    /// first random or fifo coordinator.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownCoordinator`] for a name that is not configured.
    /// - [`CoreError::UnsupportedSelector`] when no coordinator can run a selector.
    pub fn selector_chain(&self, selectors: &[Selector]) -> CoreResult<Box<dyn EntrySelector>> {
        let fallback;
        let selectors = if selectors.is_empty() {
            fallback = [self.default_selector()?];
            &fallback[..]
        } else {
            selectors
        };

        let mut chain: Option<Box<dyn EntrySelector>> = None;
        for selector in selectors {
            let coordinator = self.resolve(selector)?;
            chain = Some(Arc::clone(coordinator).create_selector(selector, chain.take())?);
        }
        chain.ok_or_else(|| CoreError::internal("empty selector chain"))
    }

    fn resolve(&self, selector: &Selector) -> CoreResult<&Arc<dyn Coordinator>> {
        if let Some(name) = selector.coordinator() {
            return self
                .coordinator(name)
                .ok_or_else(|| CoreError::UnknownCoordinator {
                    name: name.to_string(),
                });
        }
        let kind = selector.kind().coordinator_kind();
        self.coordinators
            .iter()
            .find(|c| c.kind() == kind)
            .ok_or_else(|| {
                CoreError::unsupported_selector(format!("no {kind} coordinator in {}", self.id))
            })
    }

    fn default_selector(&self) -> CoreResult<Selector> {
        self.coordinators
            .iter()
            .find_map(|c| match c.kind() {
                CoordinatorKind::Random => Some(Selector::random(Count::Exact(1)).on(c.name())),
                CoordinatorKind::Fifo => Some(Selector::fifo(Count::Exact(1)).on(c.name())),
                _ => None,
            })
            .ok_or_else(|| {
                CoreError::unsupported_selector(format!(
                    "{} has no coordinator for an unqualified selection",
                    self.id
                ))
            })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coordinators: Vec<&str> = self.coordinators.iter().map(|c| c.name()).collect();
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("coordinators", &coordinators)
            .finish_non_exhaustive()
    }
}
