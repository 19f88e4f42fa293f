//! Shared application state for Axum routers.

use std::sync::Arc;

use rowcache_storage::LookupService;

use crate::config::ServiceConfig;
use crate::jobs::CacheRefreshMetrics;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Read side of the cache.
    pub lookups: LookupService,
    pub config: Arc<ServiceConfig>,
    /// Counters owned by the refresh job, read by the readiness check.
    pub refresh_metrics: Arc<CacheRefreshMetrics>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        lookups: LookupService,
        config: ServiceConfig,
        refresh_metrics: Arc<CacheRefreshMetrics>,
    ) -> Self {
        Self {
            lookups,
            config: Arc::new(config),
            refresh_metrics,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(LookupService, lookups);
crate::impl_from_ref!(Arc<ServiceConfig>, config);
crate::impl_from_ref!(Arc<CacheRefreshMetrics>, refresh_metrics);
crate::impl_from_ref!(std::time::Instant, start_time);
