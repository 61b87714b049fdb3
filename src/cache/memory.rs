//! In-Memory Cache Backend
//!
//! HashMap storage with LRU eviction and TTL expiration. Used when no external
//! cache is configured, and in tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::entry::{current_timestamp_ms, CacheEntry};
use super::lru::LruTracker;
use super::{CacheStore, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    evictions: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }
}

// == Memory Cache ==
#[derive(Debug)]
pub struct MemoryCache {
    state: RwLock<MemoryState>,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_entries: max_entries.max(1),
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut state = self.state.write().await;
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    /// Current number of entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries evicted by the LRU policy so far.
    pub async fn evictions(&self) -> u64 {
        self.state.read().await.evictions
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        // Write lock: a hit refreshes LRU order, a stale hit removes the entry
        let mut state = self.state.write().await;
        let expired = match state.entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.is_expired(),
        };

        if expired {
            state.remove(key);
            return Ok(None);
        }

        state.lru.touch(key);
        Ok(state.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidEntry(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidEntry(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let mut state = self.state.write().await;
        let is_overwrite = state.entries.contains_key(key);
        if !is_overwrite && state.entries.len() >= self.max_entries {
            if let Some(evicted) = state.lru.evict_oldest() {
                state.entries.remove(&evicted);
                state.evictions += 1;
                debug!(key = %evicted, "Evicted least recently used entry");
            }
        }

        state
            .entries
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        state.lru.touch(key);
        Ok(())
    }

    async fn delete_by_prefixes(&self, prefixes: &[String]) -> CacheResult<u64> {
        let mut state = self.state.write().await;
        let doomed: Vec<String> = state
            .entries
            .keys()
            .filter(|key| prefixes.iter().any(|p| key.starts_with(p.as_str())))
            .cloned()
            .collect();

        let mut removed = 0;
        for key in &doomed {
            if state.remove(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(100);
        cache.set("k1", r#"{"a":1}"#, TTL).await.unwrap();

        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_is_last_writer_wins() {
        let cache = MemoryCache::new(100);
        cache.set("k1", "1", TTL).await.unwrap();
        cache.set("k1", "2", TTL).await.unwrap();

        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new(100);
        cache.set("k1", "v", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("k1").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = MemoryCache::new(3);
        cache.set("k1", "1", TTL).await.unwrap();
        cache.set("k2", "2", TTL).await.unwrap();
        cache.set("k3", "3", TTL).await.unwrap();

        // k1 becomes most recent, so k2 is evicted next
        cache.get("k1").await.unwrap();
        cache.set("k4", "4", TTL).await.unwrap();

        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.evictions().await, 1);
        assert!(cache.get("k2").await.unwrap().is_none());
        assert!(cache.get("k1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefixes_only_touches_matching_keys() {
        let cache = MemoryCache::new(100);
        for key in [
            "wearables:garmin:u1:dates:~:~",
            "wearables:garmin:u1:types:2024-03-01",
            "wearables:latest:u1:by_type:sleep:~:1",
            "wearables:garmin:u10:dates:~:~",
            "wearables:oura:u1:dates:~:~",
        ] {
            cache.set(key, "[]", TTL).await.unwrap();
        }

        let removed = cache
            .delete_by_prefixes(&[
                "wearables:garmin:u1:".to_string(),
                "wearables:latest:u1:".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(removed, 3);
        assert_eq!(cache.len().await, 2);
        assert!(cache
            .get("wearables:garmin:u10:dates:~:~")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = MemoryCache::new(100);
        cache.set("short", "v", Duration::from_millis(20)).await.unwrap();
        cache.set("long", "v", TTL).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.cleanup_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_oversized_entries_rejected() {
        let cache = MemoryCache::new(100);
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
        let big_value = "x".repeat(MAX_VALUE_SIZE + 1);

        assert!(matches!(
            cache.set(&long_key, "v", TTL).await,
            Err(CacheError::InvalidEntry(_))
        ));
        assert!(matches!(
            cache.set("k", &big_value, TTL).await,
            Err(CacheError::InvalidEntry(_))
        ));
    }
}
