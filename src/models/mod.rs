//! Request, response and query models for the gateway API
//!
//! `query` holds the validated parameter types shared by every layer;
//! `requests` and `responses` are the HTTP DTOs.

pub mod query;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use query::{validate_limit, DateRange, Page, MAX_LIMIT};
pub use requests::{AllByTypeQuery, DataQuery, DateRangeQuery, LatestQuery};
pub use responses::{
    CachedJson, HealthResponse, StatsResponse, WriteResponse, CACHE_STATUS_HEADER,
    SKIPPED_PROVIDERS_HEADER,
};
