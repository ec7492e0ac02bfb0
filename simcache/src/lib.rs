//! # SimCache
//!
//! SimCache is a library for simulating a CPU cache in front of a flat backing memory
//!
//! It provides a set-associative cache which can be parameterised by a replacement policy, an
//! access coordinator which routes reads and writes through the cache and counts hits and misses,
//! and an adaptive mode which resizes the cache while a workload runs, migrating resident lines
//! between geometries
//!
//! Everything is single threaded and owned: a [`simulator::Simulator`] owns its coordinator, which
//! owns its cache and memory. Independent experiments should build independent simulators

/// Contains the fixed-size block of words moved between memory and cache
pub mod block;

/// Contains the address decomposition, the cache implementation, and a utility enum for the
/// existing cache types
pub mod cache;

/// Contains definitions for the JSON configuration format
pub mod config;

/// Contains the coordinator which mediates every access through the cache
pub mod coordinator;

/// Contains the crate's error type
pub mod error;

/// Contains the backing memory
pub mod memory;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the adaptive resizing strategies and the migration between cache geometries
pub mod resizer;

/// Contains the simulator used to build a configured coordinator and run accesses against it
pub mod simulator;

/// Contains the hit and miss counters
pub mod stats;

#[cfg(test)]
mod test;

/// Contains the random number generator and small numeric helpers
pub mod util;

pub use error::{Error, Result};
