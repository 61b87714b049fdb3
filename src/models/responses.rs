//! Response DTOs for the gateway API
//!
//! Defines the structure of outgoing HTTP response bodies.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::invalidation::InvalidationOutcome;
use crate::providers::ProviderName;

/// Header telling the caller whether a read was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Header listing the providers missing from a partial aggregate.
pub const SKIPPED_PROVIDERS_HEADER: &str = "x-skipped-providers";

// == Cached Json ==
/// Outcome of a read-through lookup. Documents are kept serialized so a hit
/// is returned byte-for-byte as it was stored.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedJson {
    /// Served from the cache
    Hit(String),
    /// Computed from the providers (and cached)
    Miss(String),
    /// Computed from the providers that answered; not cached
    Partial {
        body: String,
        skipped: Vec<ProviderName>,
    },
    /// Nothing to return; never cached
    NoContent,
}

impl CachedJson {
    pub fn body(&self) -> Option<&str> {
        match self {
            CachedJson::Hit(body) | CachedJson::Miss(body) => Some(body),
            CachedJson::Partial { body, .. } => Some(body),
            CachedJson::NoContent => None,
        }
    }
}

impl IntoResponse for CachedJson {
    fn into_response(self) -> Response {
        let (status, body, skipped) = match self {
            CachedJson::NoContent => return StatusCode::NO_CONTENT.into_response(),
            CachedJson::Hit(body) => ("hit", body, Vec::new()),
            CachedJson::Miss(body) => ("miss", body, Vec::new()),
            CachedJson::Partial { body, skipped } => ("miss", body, skipped),
        };

        let mut response = (
            StatusCode::OK,
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                ),
                (
                    header::HeaderName::from_static(CACHE_STATUS_HEADER),
                    HeaderValue::from_static(status),
                ),
            ],
            body,
        )
            .into_response();

        if !skipped.is_empty() {
            let names: Vec<&str> = skipped.iter().map(ProviderName::as_str).collect();
            if let Ok(value) = HeaderValue::from_str(&names.join(",")) {
                response.headers_mut().insert(
                    header::HeaderName::from_static(SKIPPED_PROVIDERS_HEADER),
                    value,
                );
            }
        }
        response
    }
}

/// Response body for provider writes
/// (PUT data and DELETE user).
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse {
    /// Success message
    pub message: String,
    pub provider: ProviderName,
    pub user_id: String,
    /// Rows removed; only set for deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Whether the cache sweep that followed the write succeeded
    pub cache_invalidated: bool,
}

impl WriteResponse {
    pub fn stored(
        provider: ProviderName,
        user_id: impl Into<String>,
        outcome: InvalidationOutcome,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            message: format!("Data for '{}' stored in {}", user_id, provider),
            provider,
            user_id,
            rows_affected: None,
            cache_invalidated: matches!(outcome, InvalidationOutcome::Completed { .. }),
        }
    }

    pub fn deleted(
        provider: ProviderName,
        user_id: impl Into<String>,
        rows_affected: u64,
        outcome: InvalidationOutcome,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            message: format!("Data for '{}' deleted from {}", user_id, provider),
            provider,
            user_id,
            rows_affected: Some(rows_affected),
            cache_invalidated: matches!(outcome, InvalidationOutcome::Completed { .. }),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(cache: CacheStats) -> Self {
        let hit_rate = cache.hit_rate();
        Self { cache, hit_rate }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
