//! # Tuplex Testkit
//!
//! Test utilities for Tuplex.
//!
//! This crate provides:
//! - Test fixtures and space helpers
//! - Property-based test generators using proptest
//! - Stress testing utilities for threads contending on one space
//! - A tracing subscriber for tests
//!
//! ## Usage
//!
//! ```rust
//! use tuplex_testkit::prelude::*;
//!
//! with_space(|space| {
//!     let jobs = space.create_container(ContainerConfig::named("jobs")).unwrap();
//!     space.write(jobs, Entry::new("build")).unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::stress::*;
    pub use tuplex_core::{
        ContainerConfig, ContainerId, CoordinatorConfig, CoreError, Count, Entry, EntryType,
        Selector, Space, SpaceConfig, Value,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use stress::*;
