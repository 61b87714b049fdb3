//! Error types for the gateway
//!
//! Provides unified error handling using thiserror. Cache and provider errors
//! have their own enums because they are contained at different boundaries:
//! cache errors never leave the cache client, provider errors only leave the
//! aggregation service on single-provider calls.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::providers::ProviderName;

// == Cache Error Enum ==
/// Errors raised by a cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend could not be reached
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer within the operation timeout
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// Key or value rejected before reaching the backend
    #[error("Invalid cache entry: {0}")]
    InvalidEntry(String),

    /// Any other backend failure
    #[error("Cache backend error: {0}")]
    Backend(String),
}

// == Provider Error Enum ==
/// Errors raised by a single provider store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider backend is down
    #[error("Provider {0} unavailable")]
    Unavailable(ProviderName),

    /// Provider call exceeded the per-call timeout
    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    Timeout {
        provider: ProviderName,
        timeout_ms: u64,
    },

    /// Provider storage rejected the operation
    #[error("Provider {provider} storage error: {message}")]
    Storage {
        provider: ProviderName,
        message: String,
    },
}

// == Gateway Error Enum ==
/// Error type surfaced to the handler layer.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid request data (bad date range, empty identifiers, limits)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider name not registered
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Single-provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every provider queried by an aggregate failed
    #[error("All {0} providers failed")]
    AllProvidersFailed(usize),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidRequest(_) | GatewayError::UnknownProvider(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Provider(ProviderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Provider(_) | GatewayError::AllProvidersFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for the gateway.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Result type for cache backends.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result type for provider stores.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
