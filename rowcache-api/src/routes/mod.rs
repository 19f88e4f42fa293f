//! REST API Routes Module
//!
//! Includes:
//! - Key lookups (`/lookup` and `/`)
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics

pub mod health;
pub mod lookup;

use axum::{http::Uri, middleware::from_fn, routing::get, Router};

use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use lookup::create_router as lookup_router;

/// Fallback for unknown routes.
async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

/// Create the full application router.
///
/// All routes run behind the observability middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(lookup::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .fallback(route_not_found)
        .layer(from_fn(observability_middleware))
        .with_state(state)
}
