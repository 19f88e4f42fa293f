//! Rowcache Test Utilities
//!
//! Shared test infrastructure for the rowcache workspace:
//! - Proptest generators for keys, values, marks and update sequences
//! - Fixtures that build ready caches and seeded row stores
//! - Assertions for lookup results

// Re-export the in-memory backend from its source crate
pub use rowcache_storage::{CacheRefresher, CacheStore, FixtureRowStore, LookupService};

// Re-export core types for convenience
pub use rowcache_core::{
    CacheEntry, HighWaterMark, LookupEntry, LookupRequest, LookupResult, RawValue, Row, RowBatch,
    RowStoreError, Timestamp,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for rowcache types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    /// Generate a key from a deliberately small alphabet, so batches repeat keys.
    pub fn arb_colliding_key() -> impl Strategy<Value = String> {
        "[a-e]{1,2}"
    }

    /// Generate opaque value bytes, including the empty value.
    pub fn arb_value() -> impl Strategy<Value = RawValue> {
        prop::collection::vec(any::<u8>(), 0..64)
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_high_water_mark() -> impl Strategy<Value = HighWaterMark> {
        arb_timestamp().prop_map(HighWaterMark::new)
    }

    pub fn arb_cache_entry() -> impl Strategy<Value = CacheEntry> {
        (arb_colliding_key(), arb_value()).prop_map(|(key, value)| CacheEntry::new(key, value))
    }

    /// Generate a non-empty key batch, duplicates allowed.
    pub fn arb_key_batch(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_colliding_key(), 1..=max.max(1))
    }

    /// Generate a sequence of update rounds. Each round is a list of upserts
    /// applied to the row store before one refresh.
    pub fn arb_update_rounds() -> impl Strategy<Value = Vec<Vec<(String, RawValue)>>> {
        prop::collection::vec(
            prop::collection::vec((arb_colliding_key(), arb_value()), 0..6),
            1..8,
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built caches and row stores for common scenarios.

    use super::*;
    use std::sync::Arc;

    /// Row store holding `pairs`, each upserted in order.
    pub async fn seeded_store<K, V>(pairs: &[(K, V)]) -> Arc<FixtureRowStore>
    where
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let store = Arc::new(FixtureRowStore::new());
        for (key, value) in pairs {
            store.upsert(key.as_ref(), value.as_ref().to_vec()).await;
        }
        store
    }

    /// Refresher over `store` with an empty cache. No load has run yet.
    pub fn refresher_for(store: Arc<FixtureRowStore>) -> CacheRefresher {
        CacheRefresher::new(store, Arc::new(CacheStore::new()))
    }

    /// Cache that has completed its full load from `pairs`.
    pub async fn ready_cache<K, V>(pairs: &[(K, V)]) -> Arc<CacheStore>
    where
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let store = seeded_store(pairs).await;
        let refresher = refresher_for(store);
        if let Err(e) = refresher.full_load().await {
            panic!("fixture full load failed: {}", e);
        }
        Arc::clone(refresher.cache())
    }

    /// The two-key catalogue used throughout the lookup examples.
    pub async fn ab_cache() -> Arc<CacheStore> {
        ready_cache(&[("a", b"X"), ("b", b"Y")]).await
    }

    pub fn request(keys: &[&str]) -> LookupRequest {
        LookupRequest::new(keys.iter().map(|k| k.to_string()).collect())
            .unwrap_or_else(|e| panic!("fixture request {:?} is invalid: {}", keys, e))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for lookup results.

    use super::*;

    /// Assert that `result` answers `keys` one-to-one, in order.
    #[track_caller]
    pub fn assert_mirrors_request(result: &LookupResult, keys: &[String]) {
        assert_eq!(
            result.len(),
            keys.len(),
            "result length {} does not match request length {}",
            result.len(),
            keys.len()
        );
        for (i, (entry, key)) in result.iter().zip(keys).enumerate() {
            assert_eq!(&entry.key, key, "key mismatch at position {}", i);
        }
    }

    /// Assert that `result` holds exactly the expected values, position by position.
    #[track_caller]
    pub fn assert_values<V: AsRef<[u8]>>(result: &LookupResult, expected: &[Option<V>]) {
        let actual: Vec<Option<&[u8]>> = result.iter().map(|e| e.value.as_deref()).collect();
        let expected: Vec<Option<&[u8]>> = expected
            .iter()
            .map(|v| v.as_ref().map(|bytes| bytes.as_ref()))
            .collect();
        assert_eq!(actual, expected);
    }
}

// ============================================================================
// TESTS
// ============================================================================
