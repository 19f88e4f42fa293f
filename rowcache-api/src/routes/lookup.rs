//! Lookup REST API Routes
//!
//! `GET /lookup?keys=k1,k2,...` resolves a batch of keys against the cache.
//! `GET /?keys=...` is the same handler mounted at the root.
//!
//! The response has one entry per requested key, in request order. Values are
//! base64 encoded; a missing key has no `value` field at all.
//!
//! Keys are taken from the raw query string verbatim. Neither `%XX` escapes
//! nor `+` are decoded, so a key must be sent exactly as it is stored.

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rowcache_core::{LookupRequest, LookupResult, ValidationError};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    telemetry::METRICS,
};

// ============================================================================
// TYPES
// ============================================================================

/// Wire form of a lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub entries: Vec<LookupEntryResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntryResponse {
    pub key: String,
    /// Base64 (standard alphabet, padded) value bytes. Absent on a miss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<LookupResult> for LookupResponse {
    fn from(result: LookupResult) -> Self {
        Self {
            entries: result
                .entries
                .into_iter()
                .map(|entry| LookupEntryResponse {
                    key: entry.key,
                    value: entry.value.map(|bytes| STANDARD.encode(bytes)),
                })
                .collect(),
        }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /lookup - Resolve a comma-separated batch of keys
pub async fn lookup(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<LookupResponse>> {
    let outcome = resolve(&state, query.as_deref()).await;

    if let Ok(metrics) = METRICS.as_ref() {
        match &outcome {
            Ok(result) => metrics.record_lookup(StatusCode::OK.as_u16(), result.hits(), result.misses()),
            Err(e) => metrics.record_lookup(e.status_code().as_u16(), 0, 0),
        }
    }

    let result = outcome?;
    tracing::debug!(
        keys = result.len(),
        hits = result.hits(),
        misses = result.misses(),
        "Lookup served"
    );
    Ok(Json(LookupResponse::from(result)))
}

/// Value of the first `name` parameter in a raw query string, undecoded.
///
/// Pairs are separated by `&` or `;` and split at their first `=`. A pair
/// without `=` has an empty value.
fn query_param<'q>(query: &'q str, name: &str) -> Option<&'q str> {
    query
        .split(['&', ';'])
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(param, _)| *param == name)
        .map(|(_, value)| value)
}

async fn resolve(state: &AppState, query: Option<&str>) -> ApiResult<LookupResult> {
    let key_param = state.config.key_param.as_str();

    let raw = query
        .and_then(|q| query_param(q, key_param))
        .ok_or_else(|| ValidationError::MissingParameter {
            name: key_param.to_string(),
        })?;

    let request = LookupRequest::parse(raw, state.config.max_keys)?;

    if !state.lookups.is_ready().await {
        return Err(ApiError::service_unavailable(
            "Cache has not completed its initial load",
        ));
    }

    Ok(state.lookups.lookup_batch(&request).await)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the lookup routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(lookup))
        .route("/lookup", get(lookup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_core::LookupEntry;

    #[test]
    fn test_query_param_first_occurrence() {
        assert_eq!(query_param("format=json&keys=a,b&keys=c", "keys"), Some("a,b"));
        assert_eq!(query_param("other=1", "keys"), None);
    }

    #[test]
    fn test_query_param_is_verbatim() {
        assert_eq!(query_param("keys=a+b,c%2Cd", "keys"), Some("a+b,c%2Cd"));
        assert_eq!(query_param("keys=x=y", "keys"), Some("x=y"));
    }

    #[test]
    fn test_query_param_separators() {
        assert_eq!(query_param("a=1;keys=k", "keys"), Some("k"));
        assert_eq!(query_param("keys", "keys"), Some(""));
        assert_eq!(query_param("", "keys"), None);
    }

    #[test]
    fn test_response_omits_value_on_miss() {
        let response = LookupResponse::from(LookupResult::new(vec![
            LookupEntry::hit("example.com/ad1", vec![0x08, 0x00]),
            LookupEntry::miss("example.com/nope"),
        ]));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "entries": [
                    {"key": "example.com/ad1", "value": "CAA="},
                    {"key": "example.com/nope"}
                ]
            })
        );
    }

    #[test]
    fn test_response_keeps_empty_value() {
        let response = LookupResponse::from(LookupResult::new(vec![LookupEntry::hit("a", vec![])]));
        assert_eq!(response.entries[0].value.as_deref(), Some(""));
    }

    #[test]
    fn test_response_preserves_order_and_duplicates() {
        let response = LookupResponse::from(LookupResult::new(vec![
            LookupEntry::hit("b", b"Y".to_vec()),
            LookupEntry::hit("a", b"X".to_vec()),
            LookupEntry::hit("b", b"Y".to_vec()),
        ]));
        let keys: Vec<&str> = response.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "b"]);
    }
}
