//! Cache Client
//!
//! The single cache handle shared by every component. Bounds each backend
//! call with a timeout and turns read/write failures into misses and skipped
//! writes: the cache is never a source of truth, so its errors stop here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::stats::{CacheMetrics, CacheStats};
use super::CacheStore;
use crate::error::{CacheError, CacheResult};

/// Default budget for one invalidation sweep. A sweep walks the keyspace in
/// several round trips, so it gets far more time than a single read.
pub const DEFAULT_INVALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn CacheStore>,
    /// Bound on a single get or set
    op_timeout: Duration,
    /// Bound on a whole `delete_by_prefixes` sweep
    invalidation_timeout: Duration,
    metrics: Arc<CacheMetrics>,
}

impl CacheClient {
    pub fn new(store: Arc<dyn CacheStore>, op_timeout: Duration) -> Self {
        Self {
            store,
            op_timeout,
            invalidation_timeout: DEFAULT_INVALIDATION_TIMEOUT.max(op_timeout),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    pub fn with_invalidation_timeout(mut self, timeout: Duration) -> Self {
        self.invalidation_timeout = timeout;
        self
    }

    async fn bounded<T>(
        timeout: Duration,
        op: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(timeout))?
    }

    // == Get ==
    /// Cached document for `key`. Backend failures read as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        match Self::bounded(self.op_timeout, self.store.get(key)).await {
            Ok(Some(value)) => {
                self.metrics.record_hit();
                debug!(key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                self.metrics.record_miss();
                debug!(key, "Cache miss");
                None
            }
            Err(e) => {
                self.metrics.record_backend_error();
                self.metrics.record_miss();
                warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`. A failed write is logged and dropped.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) {
        match Self::bounded(self.op_timeout, self.store.set(key, value, ttl)).await {
            Ok(()) => {
                self.metrics.record_set();
                debug!(key, ttl_secs = ttl.as_secs(), "Cached response");
            }
            Err(e) => {
                self.metrics.record_backend_error();
                warn!(key, error = %e, "Cache write failed, response not cached");
            }
        }
    }

    // == Delete By Prefixes ==
    /// Removes every key starting with one of `prefixes`. Unlike reads, the
    /// error is returned so the caller can report the lost invalidation.
    pub async fn delete_by_prefixes(&self, prefixes: &[String]) -> CacheResult<u64> {
        let sweep = self.store.delete_by_prefixes(prefixes);
        match Self::bounded(self.invalidation_timeout, sweep).await {
            Ok(removed) => {
                self.metrics.record_invalidation(removed);
                Ok(removed)
            }
            Err(e) => {
                self.metrics.record_backend_error();
                self.metrics.record_invalidation_failure();
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{FailingCache, SlowSweepCache, StalledCache};
    use crate::cache::MemoryCache;

    fn memory_client() -> CacheClient {
        CacheClient::new(Arc::new(MemoryCache::new(100)), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_hit_and_miss_are_counted() {
        let client = memory_client();
        client.set("k", "v", Duration::from_secs(60)).await;

        assert_eq!(client.get("k").await.as_deref(), Some("v"));
        assert_eq!(client.get("other").await, None);

        let stats = client.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_backend_failure_reads_as_miss() {
        let client = CacheClient::new(Arc::new(FailingCache), Duration::from_secs(1));

        assert_eq!(client.get("k").await, None);
        client.set("k", "v", Duration::from_secs(60)).await;

        let stats = client.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.backend_errors, 2);
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let client = CacheClient::new(Arc::new(StalledCache), Duration::from_millis(20))
            .with_invalidation_timeout(Duration::from_millis(40));

        assert_eq!(client.get("k").await, None);
        let result = client.delete_by_prefixes(&["a:".to_string()]).await;
        assert!(matches!(result, Err(CacheError::Timeout(_))));
        assert_eq!(client.stats().invalidation_failures, 1);
    }

    #[tokio::test]
    async fn test_sweep_slower_than_reads_still_completes() {
        // Many round trips: well past the read budget, inside the sweep budget
        let store = SlowSweepCache::new(Duration::from_millis(300), 600);
        let client = CacheClient::new(Arc::new(store), Duration::from_millis(250))
            .with_invalidation_timeout(Duration::from_secs(2));

        let removed = client.delete_by_prefixes(&["wearables:garmin:u1:".to_string()]).await;

        assert_eq!(removed.unwrap(), 600);
        let stats = client.stats();
        assert_eq!(stats.invalidation_failures, 0);
        assert_eq!(stats.invalidated_keys, 600);
    }

    #[tokio::test]
    async fn test_default_sweep_budget_exceeds_read_budget() {
        let store = SlowSweepCache::new(Duration::from_millis(300), 1);
        let client = CacheClient::new(Arc::new(store), Duration::from_millis(250));

        assert!(client.delete_by_prefixes(&["a:".to_string()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_metrics() {
        let client = memory_client();
        let clone = client.clone();
        clone.get("k").await;
        assert_eq!(client.stats().misses, 1);
    }
}
