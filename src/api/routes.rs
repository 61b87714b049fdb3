//! API Routes
//!
//! Configures the Axum router with all gateway endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    all_by_type_handler, data_handler, dates_handler, delete_user_handler, health_handler,
    latest_handler, providers_handler, put_data_handler, stats_handler, types_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /aggregates/latest` - Newest entries of a type across providers
/// - `GET /aggregates/all` - Paged entries of a type across providers
/// - `GET /providers/:provider/users/:user_id/dates` - Dates holding data
/// - `GET /providers/:provider/users/:user_id/types/:date` - Types on a date
/// - `GET|PUT /providers/:provider/users/:user_id/data/:date` - Read or upsert a day
/// - `DELETE /providers/:provider/users/:user_id` - Remove a user's data
/// - `GET /providers` - Registered providers
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/aggregates/latest", get(latest_handler))
        .route("/aggregates/all", get(all_by_type_handler))
        .route("/providers", get(providers_handler))
        .route("/providers/:provider/users/:user_id", delete(delete_user_handler))
        .route("/providers/:provider/users/:user_id/dates", get(dates_handler))
        .route(
            "/providers/:provider/users/:user_id/types/:date",
            get(types_handler),
        )
        .route(
            "/providers/:provider/users/:user_id/data/:date",
            get(data_handler).put(put_data_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
