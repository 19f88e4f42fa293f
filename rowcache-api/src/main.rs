//! Rowcache API Server Entry Point
//!
//! Loads configuration, binds the row store backend, fills the cache with a
//! full load, then serves lookups while refreshing in the background.

use std::sync::Arc;

use rowcache_api::telemetry::{init_tracer, TelemetryConfig};
use rowcache_api::{
    cache_refresh_task, create_router, initial_load, ApiError, ApiResult, AppState, Backend,
    CacheRefreshConfig, CacheRefreshMetrics, DbConfig, PgRowStore, ServiceConfig,
};
use rowcache_storage::{CacheRefresher, CacheStore, FixtureRowStore, LookupService, RowStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let config = ServiceConfig::from_env()?;
    let store = connect_backend(config.backend)?;

    let cache = Arc::new(CacheStore::new());
    let refresher = Arc::new(CacheRefresher::new(store, Arc::clone(&cache)));

    // No traffic is accepted until the full load has succeeded.
    initial_load(&refresher).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_metrics = Arc::new(CacheRefreshMetrics::new());
    let refresh_handle = tokio::spawn(cache_refresh_task(
        Arc::clone(&refresher),
        CacheRefreshConfig::from(&config),
        Arc::clone(&refresh_metrics),
        shutdown_rx,
    ));

    let addr = config.socket_addr()?;
    let state = AppState::new(LookupService::new(cache), config, refresh_metrics);
    let app = create_router(state);

    tracing::info!(%addr, "Starting rowcache API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = refresh_handle.await {
        tracing::warn!(error = %e, "Cache refresh task did not stop cleanly");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Bind the configured row store.
fn connect_backend(backend: Backend) -> ApiResult<Arc<dyn RowStore>> {
    match backend {
        Backend::Postgres => {
            let db_config = DbConfig::from_env()?;
            Ok(Arc::new(PgRowStore::from_config(&db_config)?))
        }
        Backend::Fixture => {
            tracing::warn!("Serving from the in-memory fixture row store");
            Ok(Arc::new(FixtureRowStore::sample()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
