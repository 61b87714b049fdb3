//! Redis Cache Backend
//!
//! External cache over a multiplexed connection manager. Prefix deletion
//! walks the keyspace with `SCAN MATCH` and deletes in batches: keys written
//! under a prefix while the scan runs may survive it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tracing::{debug, info};

use super::{CacheStore, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, CacheResult};

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 500;

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connects to `url` and verifies the connection with a PING.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        info!("Connecting to Redis cache");
        let client = Client::open(url)
            .map_err(|e| CacheError::Backend(format!("Invalid Redis URL: {}", e)))?;
        let mut conn = ConnectionManager::new(client).await.map_err(map_redis_error)?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(map_redis_error)?;

        info!("Redis cache connected");
        Ok(Self { conn })
    }

    async fn scan_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let pattern = format!("{}*", escape_glob(prefix));
        let removed = drain_cursor(|cursor| {
            let mut conn = self.conn.clone();
            let pattern = pattern.clone();
            async move {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;

                let deleted: u64 = if keys.is_empty() {
                    0
                } else {
                    conn.del(&keys).await.map_err(map_redis_error)?
                };
                Ok((next, deleted))
            }
        })
        .await?;

        debug!(prefix, removed, "Swept prefix");
        Ok(removed)
    }
}

/// Walks a SCAN cursor from 0 until the server hands back 0 again. `step`
/// processes one batch and returns the next cursor with the keys it removed.
async fn drain_cursor<F, Fut>(mut step: F) -> CacheResult<u64>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = CacheResult<(u64, u64)>>,
{
    let mut cursor = 0;
    let mut removed = 0;
    loop {
        let (next, deleted) = step(cursor).await?;
        removed += deleted;
        if next == 0 {
            return Ok(removed);
        }
        cursor = next;
    }
}

/// `EX` takes whole seconds. Sub-second remainders round up; Redis rejects 0.
fn expiry_secs(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).div_ceil(1000).max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if key.len() > MAX_KEY_LENGTH || value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidEntry(format!(
                "Entry for key of {} bytes exceeds size limits",
                key.len()
            )));
        }

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry_secs(ttl))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn delete_by_prefixes(&self, prefixes: &[String]) -> CacheResult<u64> {
        let mut removed = 0;
        for prefix in prefixes {
            removed += self.scan_prefix(prefix).await?;
        }
        Ok(removed)
    }
}

fn map_redis_error(err: RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::Unavailable(err.to_string())
    } else {
        CacheError::Backend(err.to_string())
    }
}

/// Escapes glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[tokio::test]
    async fn test_drain_cursor_follows_cursor_until_zero() {
        let mut script = VecDeque::from([(7, 3), (12, 0), (0, 2)]);
        let mut seen = Vec::new();

        let removed = drain_cursor(|cursor| {
            seen.push(cursor);
            let step = script.pop_front();
            async move { step.ok_or_else(|| CacheError::Backend("cursor overrun".into())) }
        })
        .await;

        assert_eq!(removed.unwrap(), 5);
        assert_eq!(seen, vec![0, 7, 12]);
    }

    #[tokio::test]
    async fn test_drain_cursor_single_batch() {
        let mut calls = 0;
        let removed = drain_cursor(|_| {
            calls += 1;
            async { Ok((0, 4)) }
        })
        .await;

        assert_eq!(removed.unwrap(), 4);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_drain_cursor_stops_on_error() {
        let mut calls = 0;
        let result = drain_cursor(|cursor| {
            calls += 1;
            async move {
                if cursor == 0 {
                    Ok((9, 1))
                } else {
                    Err(CacheError::Unavailable("connection reset".into()))
                }
            }
        })
        .await;

        assert!(matches!(result, Err(CacheError::Unavailable(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_expiry_secs_rounds_up() {
        assert_eq!(expiry_secs(Duration::ZERO), 1);
        assert_eq!(expiry_secs(Duration::from_millis(400)), 1);
        assert_eq!(expiry_secs(Duration::from_millis(1500)), 2);
        assert_eq!(expiry_secs(Duration::from_secs(300)), 300);
    }

    #[test]
    fn test_escape_glob_plain_prefix() {
        assert_eq!(escape_glob("wearables:garmin:u1:"), "wearables:garmin:u1:");
    }

    #[test]
    fn test_escape_glob_metacharacters() {
        assert_eq!(escape_glob("lab:x:a*b?[c]:"), r"lab:x:a\*b\?\[c\]:");
        assert_eq!(escape_glob(r"a\b"), r"a\\b");
    }
}
