//! # Tuplex Storage
//!
//! Storage contract and in-memory implementation for Tuplex.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! isolation manager, coordinators and containers. The core never talks to a
//! concrete storage engine; it only uses the [`StoredMap`] contract.
//!
//! ## Design Principles
//!
//! - Maps are plain key/value stores and know nothing about locks or coordinators
//! - Mutations may carry a [`StorageTxn`] so durable backends can batch or undo them
//! - Maps must be `Send + Sync` for concurrent access
//! - A destroyed map rejects every further operation
//!
//! ## Available Backends
//!
//! - [`InMemoryStoredMap`] - Applies every change immediately, no persistence
//!
//! ## Example
//!
//! ```rust
//! use tuplex_storage::{InMemoryStoredMap, StoredMap};
//!
//! let map: InMemoryStoredMap<u32, String> = InMemoryStoredMap::new("names");
//! map.put(1, "one".to_string(), None).unwrap();
//! assert_eq!(map.get(&1).unwrap().as_deref(), Some("one"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod error;
mod map;
mod memory;

pub use catalog::MapCatalog;
pub use error::{StorageError, StorageResult};
pub use map::{StorageTxn, StoredMap};
pub use memory::InMemoryStoredMap;
