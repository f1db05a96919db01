//! lrumap-core: bounded, recency-ordered key-value map
//!
//! The map keeps at most `capacity` entries. Keyed reads promote the entry to
//! most-recently used; inserting a new key into a full map evicts the
//! least-recently used entry.
//!
//! # Modules
//!
//! - `lru_map`: the map itself, its iterators and access counters
//! - `scenario`: YAML-driven operation scripts with expectations
//! - `config`: `lrumap.toml` loading and validation
//! - `logging`: tracing subscriber setup for hosts
//! - `error`: error types with remediation hints
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod lru_map;
pub mod scenario;

pub use error::{Error, Result};
pub use lru_map::{CacheStats, DisplayNullable, LruMap};

/// Version of the lrumap-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
