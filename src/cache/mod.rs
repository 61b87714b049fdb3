//! Cache Module
//!
//! The cache store contract, its in-memory and Redis backends, the shared
//! best-effort client and the key policy.

mod client;
mod entry;
pub mod keys;
mod lru;
mod memory;
mod redis_cache;
mod stats;

#[cfg(test)]
mod property_tests;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

// Re-export public types
pub use client::{CacheClient, DEFAULT_INVALIDATION_TIMEOUT};
pub use entry::CacheEntry;
pub use keys::{CacheScope, Domain, KeyParam, WearableKey};
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use stats::{CacheMetrics, CacheStats};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 4 * 1024 * 1024; // 4 MB

// == Cache Store ==
/// TTL-capable key-value backend.
///
/// Values are whole JSON documents; `set` replaces a value atomically and the
/// last writer wins. `delete_by_prefixes` is eventually exact: a key written
/// under a matching prefix while the sweep runs may survive it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value stored under `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Removes every live key starting with any of `prefixes`. Returns the
    /// number of keys removed.
    async fn delete_by_prefixes(&self, prefixes: &[String]) -> CacheResult<u64>;
}
