//! Space and container configuration.

use crate::coordinator::CoordinatorConfig;
use crate::types::IsolationLevel;

/// Configuration for a [`Space`](crate::Space).
#[derive(Debug, Clone)]
pub struct SpaceConfig {
    /// Isolation level of transactions begun without an explicit level.
    pub default_isolation: IsolationLevel,

    /// Coordinators of containers created without explicit coordinators.
    pub default_coordinators: Vec<CoordinatorConfig>,

    /// Maximum entries per container unless the container sets its own.
    pub default_max_size: Option<usize>,

    /// Seed for random coordinators. `None` seeds from the OS.
    pub random_seed: Option<u64>,

    /// Whether to count operations in [`SpaceStats`](crate::SpaceStats).
    pub record_stats: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            default_isolation: IsolationLevel::RepeatableRead,
            default_coordinators: vec![CoordinatorConfig::random(), CoordinatorConfig::fifo()],
            default_max_size: None,
            random_seed: None,
            record_stats: true,
        }
    }
}

impl SpaceConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default isolation level.
    #[must_use]
    pub const fn default_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = level;
        self
    }

    /// Sets the default container coordinators.
    #[must_use]
    pub fn default_coordinators(mut self, coordinators: Vec<CoordinatorConfig>) -> Self {
        self.default_coordinators = coordinators;
        self
    }

    /// Sets the default maximum container size.
    #[must_use]
    pub const fn default_max_size(mut self, max_size: Option<usize>) -> Self {
        self.default_max_size = max_size;
        self
    }

    /// Fixes the random coordinator seed.
    #[must_use]
    pub const fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Sets whether to record statistics.
    #[must_use]
    pub const fn record_stats(mut self, value: bool) -> Self {
        self.record_stats = value;
        self
    }
}

/// Configuration of a new container.
///
/// Unset fields fall back to the space's defaults.
///
/// ```rust
/// use tuplex_core::{ContainerConfig, CoordinatorConfig};
///
/// let config = ContainerConfig::named("orders")
///     .coordinator(CoordinatorConfig::fifo())
///     .coordinator(CoordinatorConfig::key())
///     .max_size(1_000);
/// assert_eq!(config.name.as_deref(), Some("orders"));
/// assert_eq!(config.coordinators.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    /// Unique name, if any.
    pub name: Option<String>,

    /// Coordinators in registration order; empty means the space default.
    pub coordinators: Vec<CoordinatorConfig>,

    /// Maximum number of entries.
    pub max_size: Option<usize>,
}

impl ContainerConfig {
    /// An anonymous container with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A named container with default settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Appends a coordinator.
    #[must_use]
    pub fn coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinators.push(coordinator);
        self
    }

    /// Sets the maximum number of entries.
    #[must_use]
    pub const fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorKind;

    #[test]
    fn default_config() {
        let config = SpaceConfig::default();
        assert_eq!(config.default_isolation, IsolationLevel::RepeatableRead);
        assert!(config.record_stats);
        assert_eq!(config.random_seed, None);
        let kinds: Vec<_> = config.default_coordinators.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![CoordinatorKind::Random, CoordinatorKind::Fifo]);
    }

    #[test]
    fn builder_pattern() {
        let config = SpaceConfig::new()
            .default_isolation(IsolationLevel::ReadCommitted)
            .random_seed(9)
            .default_max_size(Some(10))
            .record_stats(false);

        assert_eq!(config.default_isolation, IsolationLevel::ReadCommitted);
        assert_eq!(config.random_seed, Some(9));
        assert_eq!(config.default_max_size, Some(10));
        assert!(!config.record_stats);
    }
}
