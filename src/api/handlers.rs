//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint. Handlers only parse and
//! validate; caching, aggregation and invalidation live in the service.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::models::{
    AllByTypeQuery, CachedJson, DataQuery, DateRangeQuery, HealthResponse, LatestQuery,
    StatsResponse, WriteResponse,
};
use crate::providers::ProviderName;
use crate::service::WearableService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WearableService>,
}

impl AppState {
    pub fn new(service: WearableService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Handler for GET /aggregates/latest
pub async fn latest_handler(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<CachedJson> {
    if let Some(error_msg) = query.validate() {
        return Err(GatewayError::InvalidRequest(error_msg));
    }
    let device = query.device()?;

    state
        .service
        .latest_by_type(&query.user_id, &query.data_type, device, query.limit())
        .await
}

/// Handler for GET /aggregates/all
pub async fn all_by_type_handler(
    State(state): State<AppState>,
    Query(query): Query<AllByTypeQuery>,
) -> Result<CachedJson> {
    if let Some(error_msg) = query.validate() {
        return Err(GatewayError::InvalidRequest(error_msg));
    }

    state
        .service
        .all_by_type(&query.user_id, &query.data_type, query.range()?, query.page()?)
        .await
}

/// Handler for GET /providers/:provider/users/:user_id/dates
pub async fn dates_handler(
    State(state): State<AppState>,
    Path((provider, user_id)): Path<(String, String)>,
    Query(query): Query<DateRangeQuery>,
) -> Result<CachedJson> {
    let provider: ProviderName = provider.parse()?;
    state.service.dates(provider, &user_id, query.range()?).await
}

/// Handler for GET /providers/:provider/users/:user_id/types/:date
pub async fn types_handler(
    State(state): State<AppState>,
    Path((provider, user_id, date)): Path<(String, String, String)>,
) -> Result<CachedJson> {
    let provider: ProviderName = provider.parse()?;
    state.service.types(provider, &user_id, parse_date(&date)?).await
}

/// Handler for GET /providers/:provider/users/:user_id/data/:date
pub async fn data_handler(
    State(state): State<AppState>,
    Path((provider, user_id, date)): Path<(String, String, String)>,
    Query(query): Query<DataQuery>,
) -> Result<CachedJson> {
    if let Some(error_msg) = query.validate() {
        return Err(GatewayError::InvalidRequest(error_msg));
    }
    let provider: ProviderName = provider.parse()?;

    state
        .service
        .data(provider, &user_id, parse_date(&date)?, query.data_type.as_deref())
        .await
}

/// Handler for PUT /providers/:provider/users/:user_id/data/:date
///
/// Upserts the day's payload and answers once the cache is invalidated.
pub async fn put_data_handler(
    State(state): State<AppState>,
    Path((provider, user_id, date)): Path<(String, String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<WriteResponse>> {
    let provider: ProviderName = provider.parse()?;
    let outcome = state
        .service
        .insert_data(provider, &user_id, parse_date(&date)?, payload)
        .await?;

    Ok(Json(WriteResponse::stored(provider, user_id, outcome)))
}

/// Handler for DELETE /providers/:provider/users/:user_id
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path((provider, user_id)): Path<(String, String)>,
) -> Result<Json<WriteResponse>> {
    let provider: ProviderName = provider.parse()?;
    let (rows, outcome) = state.service.delete_all_data(provider, &user_id).await?;

    Ok(Json(WriteResponse::deleted(provider, user_id, rows, outcome)))
}

/// Handler for GET /providers
pub async fn providers_handler(State(state): State<AppState>) -> Result<CachedJson> {
    state.service.providers().await
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.service.cache_stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse().map_err(|_| {
        GatewayError::InvalidRequest(format!("invalid date '{}', expected YYYY-MM-DD", raw))
    })
}
