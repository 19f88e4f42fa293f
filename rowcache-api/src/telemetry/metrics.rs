//! Prometheus Metrics Definitions
//!
//! Defines all rowcache metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use rowcache_storage::CacheStats;

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 0.1ms up to 1s. Lookups are served from memory.
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0,
];

/// Global metrics instance - initialized once at first use
pub static METRICS: Lazy<ApiResult<RowcacheMetrics>> = Lazy::new(RowcacheMetrics::new);

/// Container for all rowcache metrics.
#[derive(Clone)]
pub struct RowcacheMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Lookup request counter - labels: status
    pub lookup_requests_total: CounterVec,

    /// Looked-up keys - labels: outcome (hit/miss)
    pub lookup_keys_total: CounterVec,

    /// Refresh cycles - labels: result (success/failure)
    pub refresh_cycles_total: CounterVec,

    /// Keys currently cached
    pub cache_entries: Gauge,

    /// High-water mark as Unix seconds
    pub high_water_mark_seconds: Gauge,
}

impl RowcacheMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "rowcache_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "rowcache_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            lookup_requests_total: register_counter_vec!(
                "rowcache_lookup_requests_total",
                "Total number of lookup requests",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register lookup_requests_total: {}", e)))?,

            lookup_keys_total: register_counter_vec!(
                "rowcache_lookup_keys_total",
                "Total number of keys resolved by lookups",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register lookup_keys_total: {}", e)))?,

            refresh_cycles_total: register_counter_vec!(
                "rowcache_refresh_cycles_total",
                "Total number of incremental refresh cycles",
                &["result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register refresh_cycles_total: {}", e)))?,

            cache_entries: register_gauge!(
                "rowcache_cache_entries",
                "Current number of cached keys"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_entries: {}", e)))?,

            high_water_mark_seconds: register_gauge!(
                "rowcache_high_water_mark_seconds",
                "Read timestamp of the last successful load, as Unix seconds"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register high_water_mark_seconds: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a lookup request and, on success, its hit/miss split.
    pub fn record_lookup(&self, status: u16, hits: usize, misses: usize) {
        let status_str = status.to_string();
        self.lookup_requests_total
            .with_label_values(&[status_str.as_str()])
            .inc();
        self.lookup_keys_total
            .with_label_values(&["hit"])
            .inc_by(hits as f64);
        self.lookup_keys_total
            .with_label_values(&["miss"])
            .inc_by(misses as f64);
    }

    /// Record a refresh cycle.
    pub fn record_refresh_cycle(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.refresh_cycles_total.with_label_values(&[result]).inc();
    }

    /// Publish cache size and mark.
    pub fn observe_cache(&self, stats: &CacheStats) {
        self.cache_entries.set(stats.entry_count as f64);
        if let Some(mark) = stats.high_water_mark {
            self.high_water_mark_seconds.set(mark.as_epoch_seconds());
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
