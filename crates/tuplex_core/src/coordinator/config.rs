//! Coordinator configuration.

use super::{
    Coordinator, CoordinatorKind, EntryMap, FifoCoordinator, KeyCoordinator, NoOperationCoordinator,
    QueryCoordinator, RandomCoordinator, TypeCoordinator,
};
use crate::entry::EntryType;
use crate::error::CoreResult;
use crate::query::QueryEngine;
use crate::types::ContainerId;
use std::sync::Arc;
use tuplex_storage::MapCatalog;

/// Strategy-specific coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorSpec {
    /// Random selection.
    Random,
    /// Registration-order selection.
    Fifo,
    /// Key-based selection.
    Key,
    /// Type-based selection.
    Type {
        /// Types (and their subtypes) the coordinator accepts; empty accepts all.
        allowed: Vec<EntryType>,
    },
    /// Query-based selection.
    Query {
        /// Properties with a secondary index.
        indexed_properties: Vec<String>,
    },
    /// Registration only.
    NoOperation,
}

impl CoordinatorSpec {
    /// Returns the strategy.
    #[must_use]
    pub const fn kind(&self) -> CoordinatorKind {
        match self {
            Self::Random => CoordinatorKind::Random,
            Self::Fifo => CoordinatorKind::Fifo,
            Self::Key => CoordinatorKind::Key,
            Self::Type { .. } => CoordinatorKind::Type,
            Self::Query { .. } => CoordinatorKind::Query,
            Self::NoOperation => CoordinatorKind::NoOperation,
        }
    }
}

/// Configuration of one coordinator of a container.
///
/// ```rust
/// use tuplex_core::{CoordinatorConfig, CoordinatorKind, EntryType};
///
/// let by_price = CoordinatorConfig::query(["price"]).named("by_price");
/// assert_eq!(by_price.name(), "by_price");
///
/// let orders = CoordinatorConfig::typed([EntryType::new("order")]);
/// assert_eq!(orders.name(), "type");
/// assert_eq!(orders.kind(), CoordinatorKind::Type);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    name: Option<String>,
    spec: CoordinatorSpec,
}

impl CoordinatorConfig {
    /// Creates a configuration from a strategy spec.
    #[must_use]
    pub const fn new(spec: CoordinatorSpec) -> Self {
        Self { name: None, spec }
    }

    /// Random coordinator.
    #[must_use]
    pub const fn random() -> Self {
        Self::new(CoordinatorSpec::Random)
    }

    /// Fifo coordinator.
    #[must_use]
    pub const fn fifo() -> Self {
        Self::new(CoordinatorSpec::Fifo)
    }

    /// Key coordinator.
    #[must_use]
    pub const fn key() -> Self {
        Self::new(CoordinatorSpec::Key)
    }

    /// Type coordinator accepting `allowed` types; pass nothing to accept all.
    pub fn typed(allowed: impl IntoIterator<Item = EntryType>) -> Self {
        Self::new(CoordinatorSpec::Type {
            allowed: allowed.into_iter().collect(),
        })
    }

    /// Query coordinator indexing the given properties.
    pub fn query<I, S>(indexed_properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CoordinatorSpec::Query {
            indexed_properties: indexed_properties.into_iter().map(Into::into).collect(),
        })
    }

    /// Registration-only coordinator.
    #[must_use]
    pub const fn no_operation() -> Self {
        Self::new(CoordinatorSpec::NoOperation)
    }

    /// Sets a custom name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the configured name or the strategy's default name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.spec.kind().default_name())
    }

    /// Returns the strategy.
    #[must_use]
    pub const fn kind(&self) -> CoordinatorKind {
        self.spec.kind()
    }

    /// Returns the strategy settings.
    #[must_use]
    pub const fn spec(&self) -> &CoordinatorSpec {
        &self.spec
    }

    /// Instantiates the coordinator for `container`.
    pub(crate) fn build(
        &self,
        container: ContainerId,
        env: &CoordinatorEnv<'_>,
    ) -> CoreResult<Arc<dyn Coordinator>> {
        let name = self.name().to_string();
        let map_name = format!("{container}/{name}");
        let coordinator: Arc<dyn Coordinator> = match &self.spec {
            CoordinatorSpec::Random => {
                let seed = env.seed.map(|seed| seed ^ container.as_u64());
                Arc::new(RandomCoordinator::new(
                    name,
                    EntryMap::create(env.catalog, &map_name)?,
                    seed,
                ))
            }
            CoordinatorSpec::Fifo => {
                Arc::new(FifoCoordinator::new(name, EntryMap::create(env.catalog, &map_name)?))
            }
            CoordinatorSpec::Key => {
                Arc::new(KeyCoordinator::new(name, EntryMap::create(env.catalog, &map_name)?))
            }
            CoordinatorSpec::Type { allowed } => Arc::new(TypeCoordinator::new(
                name,
                EntryMap::create(env.catalog, &map_name)?,
                allowed.clone(),
            )),
            CoordinatorSpec::Query { indexed_properties } => Arc::new(QueryCoordinator::new(
                name,
                EntryMap::create(env.catalog, &map_name)?,
                Arc::clone(env.engine),
                indexed_properties.iter().cloned(),
            )),
            CoordinatorSpec::NoOperation => Arc::new(NoOperationCoordinator::new(name)),
        };
        Ok(coordinator)
    }
}

/// Space-wide resources coordinators are built from.
pub(crate) struct CoordinatorEnv<'a> {
    pub(crate) catalog: &'a Arc<MapCatalog>,
    pub(crate) engine: &'a Arc<dyn QueryEngine>,
    pub(crate) seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PredicateEngine;

    #[test]
    fn default_names_follow_kind() {
        assert_eq!(CoordinatorConfig::random().name(), "random");
        assert_eq!(CoordinatorConfig::no_operation().name(), "noop");
        assert_eq!(CoordinatorConfig::fifo().named("queue").name(), "queue");
    }

    #[test]
    fn build_creates_named_storage() {
        let catalog = Arc::new(MapCatalog::new());
        let engine: Arc<dyn QueryEngine> = Arc::new(PredicateEngine);
        let env = CoordinatorEnv {
            catalog: &catalog,
            engine: &engine,
            seed: Some(7),
        };

        let coordinator = CoordinatorConfig::key()
            .named("by_id")
            .build(ContainerId::new(3), &env)
            .unwrap();
        assert_eq!(coordinator.name(), "by_id");
        assert_eq!(coordinator.kind(), CoordinatorKind::Key);
        assert!(catalog.contains("cnt:3/by_id"));

        // No-operation coordinators keep nothing.
        CoordinatorConfig::no_operation()
            .build(ContainerId::new(3), &env)
            .unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn duplicate_storage_name_fails() {
        let catalog = Arc::new(MapCatalog::new());
        let engine: Arc<dyn QueryEngine> = Arc::new(PredicateEngine);
        let env = CoordinatorEnv {
            catalog: &catalog,
            engine: &engine,
            seed: None,
        };
        CoordinatorConfig::fifo()
            .build(ContainerId::new(1), &env)
            .unwrap();
        assert!(CoordinatorConfig::random()
            .named("fifo")
            .build(ContainerId::new(1), &env)
            .is_err());
    }
}
