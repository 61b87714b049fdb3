//! Wearable Gateway - cache and aggregation server for wearable-device data
//!
//! Serves provider views and cross-provider aggregates through a
//! read-through cache that is invalidated on every provider write.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wearable_gateway::cache::{CacheClient, CacheStore, MemoryCache, RedisCache};
use wearable_gateway::providers::ProviderRegistry;
use wearable_gateway::{create_router, spawn_cleanup_task, AppState, Config, WearableService};

/// Main entry point for the gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the cache backend (Redis when configured, memory otherwise)
/// 4. Register providers and build the service
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wearable_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Wearable Gateway");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, redis={}, provider_timeout={}ms, aggregate_ttl={}s",
        config.server_port,
        config.redis_url.is_some(),
        config.provider_timeout.as_millis(),
        config.ttl.aggregate.as_secs()
    );

    let (store, cleanup_handle) = cache_backend(&config).await?;
    let cache = CacheClient::new(store, config.cache_op_timeout)
        .with_invalidation_timeout(config.invalidation_timeout);

    let registry = ProviderRegistry::in_memory();
    info!("Registered providers: {:?}", registry.names());

    let service =
        WearableService::new(cache, registry, config.provider_timeout, config.ttl.clone());
    let app = create_router(AppState::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Picks the cache backend. Only the in-memory backend needs a sweeper.
async fn cache_backend(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CacheStore>, Option<JoinHandle<()>>)> {
    match &config.redis_url {
        Some(url) => {
            let redis = RedisCache::connect(url)
                .await
                .with_context(|| format!("failed to connect to Redis at {}", url))?;
            info!("Using Redis cache backend");
            let store: Arc<dyn CacheStore> = Arc::new(redis);
            Ok((store, None))
        }
        None => {
            let memory = Arc::new(MemoryCache::new(config.max_entries));
            let handle = spawn_cleanup_task(memory.clone(), config.cleanup_interval);
            info!(
                "Using in-memory cache backend: max_entries={}, cleanup_interval={}s",
                config.max_entries, config.cleanup_interval
            );
            let store: Arc<dyn CacheStore> = memory;
            Ok((store, Some(handle)))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
