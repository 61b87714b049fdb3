//! Wearable Gateway - read-through cache over wearable-device providers
//!
//! Aggregates measurements from several device vendors, caches composed
//! answers under hierarchical keys and invalidates them on every write.

pub mod aggregation;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod providers;
pub mod service;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use service::WearableService;
pub use tasks::spawn_cleanup_task;
