//! Response cache and freshness tracking for offline support.
//!
//! This module provides:
//! - A partitioned request/response cache keyed by method + exact URL
//! - Freshness records (per URL and global) for the "last updated" indicator
//! - `FetchCache`, the network-first fetch wrapper with cache fallback

pub mod freshness;
mod layer;
mod storage;
mod traits;

pub use freshness::StatusUpdate;
pub use layer::FetchCache;
pub use storage::{CacheStorage, FreshnessStore, SqliteStorage, StoredResponse};
pub use traits::{CacheResult, CacheSource};

#[cfg(test)]
pub(crate) use storage::testing::ReadOnlyStorage;
