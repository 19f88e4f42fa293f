//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/ready - Cache readiness (initial full load completed)
//! - /health/live - Process alive check

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::jobs::CacheRefreshSnapshot;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub cache: CacheHealth,
    pub refresh: RefreshHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub entry_count: usize,
    /// RFC 3339 read timestamp of the last successful load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_water_mark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshHealth {
    pub status: HealthStatus,
    pub cycles: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub rows_merged: u64,
}

impl From<CacheRefreshSnapshot> for RefreshHealth {
    fn from(snapshot: CacheRefreshSnapshot) -> Self {
        // The cache keeps serving its last good state while refreshes fail.
        let status = if snapshot.consecutive_failures == 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            cycles: snapshot.cycles,
            failures: snapshot.failures,
            consecutive_failures: snapshot.consecutive_failures,
            rows_merged: snapshot.rows_merged,
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
///
/// 503 until the initial full load has installed a high-water mark. A failing
/// refresh job only degrades the report.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.lookups.cache().stats().await;

    let cache = CacheHealth {
        status: if stats.high_water_mark.is_some() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        entry_count: stats.entry_count,
        high_water_mark: stats.high_water_mark.map(|mark| mark.to_string()),
        age_seconds: stats.high_water_mark.map(|mark| mark.age(Utc::now()).as_secs()),
    };
    let refresh = RefreshHealth::from(state.refresh_metrics.snapshot());

    let overall_status = match (cache.status, refresh.status) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    };

    let message = match overall_status {
        HealthStatus::Unhealthy => Some("Cache has not completed its initial load".to_string()),
        HealthStatus::Degraded => Some("Recent cache refreshes failed".to_string()),
        HealthStatus::Healthy => None,
    };

    let response = HealthResponse {
        status: overall_status,
        message,
        details: Some(HealthDetails {
            cache,
            refresh,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
