//! Shared helpers for the Tuplex benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
