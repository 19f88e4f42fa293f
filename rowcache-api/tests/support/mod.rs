//! Shared helpers for router tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rowcache_api::{create_router, AppState, CacheRefreshMetrics, ServiceConfig};
use rowcache_storage::{CacheStore, LookupService};
use tower::ServiceExt;

/// Router over `cache` with default service config.
pub fn app_for(cache: Arc<CacheStore>) -> Router {
    app_with_config(cache, ServiceConfig::default())
}

pub fn app_with_config(cache: Arc<CacheStore>, config: ServiceConfig) -> Router {
    let state = AppState::new(
        LookupService::new(cache),
        config,
        Arc::new(CacheRefreshMetrics::new()),
    );
    create_router(state)
}

/// Issue a GET and return the status with the body parsed as JSON.
///
/// Non-JSON bodies come back as a JSON string.
pub async fn get(app: Router, uri: &str) -> Result<(StatusCode, serde_json::Value), String> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .map_err(|e| e.to_string())?;
    let response = app.oneshot(request).await.map_err(|e| e.to_string())?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| e.to_string())?;
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    Ok((status, json))
}
