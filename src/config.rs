//! Configuration Module
//!
//! Handles loading and managing gateway configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::cache::{WearableKey, DEFAULT_INVALIDATION_TIMEOUT};
use crate::providers::ProviderName;

// == TTL Policy ==
/// Time-to-live per cached view.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    /// Cross-provider aggregates change on every write to any provider
    pub aggregate: Duration,
    /// Single-provider date/type/data views
    pub provider_view: Duration,
    /// Near-static reference lists
    pub reference: Duration,
    /// Provider-specific replacements for `provider_view`
    pub provider_overrides: HashMap<ProviderName, Duration>,
}

impl TtlPolicy {
    /// TTL applied when caching the response for `key`.
    pub fn ttl_for(&self, key: &WearableKey) -> Duration {
        match key {
            WearableKey::Latest { .. } | WearableKey::AllByType { .. } => self.aggregate,
            WearableKey::Providers => self.reference,
            WearableKey::Dates { provider, .. }
            | WearableKey::Types { provider, .. }
            | WearableKey::Data { provider, .. } => self
                .provider_overrides
                .get(provider)
                .copied()
                .unwrap_or(self.provider_view),
        }
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        let provider_overrides = ProviderName::ALL
            .into_iter()
            .filter_map(|provider| {
                let var = format!("TTL_{}_SECS", provider.as_str().to_uppercase());
                env_parse::<u64>(&var).map(|secs| (provider, Duration::from_secs(secs)))
            })
            .collect();

        Self {
            aggregate: env_secs("TTL_AGGREGATE_SECS").unwrap_or(defaults.aggregate),
            provider_view: env_secs("TTL_PROVIDER_VIEW_SECS").unwrap_or(defaults.provider_view),
            reference: env_secs("TTL_REFERENCE_SECS").unwrap_or(defaults.reference),
            provider_overrides,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            aggregate: Duration::from_secs(5 * 60),
            provider_view: Duration::from_secs(10 * 60),
            reference: Duration::from_secs(6 * 60 * 60),
            provider_overrides: HashMap::new(),
        }
    }
}

/// Gateway configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// External cache URL; the in-memory cache is used when unset
    pub redis_url: Option<String>,
    /// Maximum number of entries the in-memory cache can hold
    pub max_entries: usize,
    /// In-memory expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Upper bound on any single cache read or write
    pub cache_op_timeout: Duration,
    /// Upper bound on one whole invalidation sweep
    pub invalidation_timeout: Duration,
    /// Upper bound on any single provider call
    pub provider_timeout: Duration,
    pub ttl: TtlPolicy,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REDIS_URL` - Redis connection URL (default: unset, in-memory cache)
    /// - `MAX_ENTRIES` - Maximum in-memory cache entries (default: 10000)
    /// - `CLEANUP_INTERVAL` - In-memory sweep frequency in seconds (default: 1)
    /// - `CACHE_OP_TIMEOUT_MS` - Cache read/write timeout (default: 250)
    /// - `CACHE_INVALIDATION_TIMEOUT_MS` - Invalidation sweep timeout (default: 5000)
    /// - `PROVIDER_TIMEOUT_MS` - Provider call timeout (default: 2000)
    /// - `TTL_AGGREGATE_SECS`, `TTL_PROVIDER_VIEW_SECS`, `TTL_REFERENCE_SECS`
    /// - `TTL_<PROVIDER>_SECS` - e.g. `TTL_GARMIN_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            max_entries: env_parse("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: env_parse("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            cache_op_timeout: env_parse("CACHE_OP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cache_op_timeout),
            invalidation_timeout: env_parse("CACHE_INVALIDATION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.invalidation_timeout),
            provider_timeout: env_parse("PROVIDER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.provider_timeout),
            ttl: TtlPolicy::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            redis_url: None,
            max_entries: 10_000,
            cleanup_interval: 1,
            cache_op_timeout: Duration::from_millis(250),
            invalidation_timeout: DEFAULT_INVALIDATION_TIMEOUT,
            provider_timeout: Duration::from_millis(2000),
            ttl: TtlPolicy::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|v| v.parse().ok())
}

fn env_secs(var: &str) -> Option<Duration> {
    env_parse(var).map(Duration::from_secs)
}
