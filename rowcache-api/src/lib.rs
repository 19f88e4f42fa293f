//! Rowcache API - HTTP Layer
//!
//! Serves batched key lookups from an in-process cache that mirrors a remote
//! row store. The cache is filled by a full load at startup and kept current
//! by a background incremental refresh.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{Backend, ServiceConfig};
pub use db::{DbConfig, PgRowStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{cache_refresh_task, initial_load, CacheRefreshConfig, CacheRefreshMetrics};
pub use routes::create_router;
pub use state::AppState;
