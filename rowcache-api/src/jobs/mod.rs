//! Background Jobs for the rowcache API
//!
//! - `cache_refresh`: Periodic incremental refresh of the cache
//!
//! # Usage
//!
//! Background jobs are spawned during server startup, after `initial_load`:
//!
//! ```ignore
//! use rowcache_api::jobs::{cache_refresh_task, CacheRefreshConfig, CacheRefreshMetrics};
//! use tokio::sync::watch;
//!
//! // Create shutdown signal
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//! // Spawn refresh task
//! let metrics = Arc::new(CacheRefreshMetrics::new());
//! tokio::spawn(cache_refresh_task(refresher, config, metrics, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod cache_refresh;

// Re-export commonly used types
pub use cache_refresh::{
    cache_refresh_task, initial_load, CacheRefreshConfig, CacheRefreshMetrics,
    CacheRefreshSnapshot,
};
