//! Full load and incremental refresh.
//!
//! The refresher is the cache's only writer. It reads from a [`RowStore`]
//! and merges each successful batch into the [`CacheStore`] together with
//! the batch's read timestamp. A failed read never touches the cache, so
//! the next attempt re-reads from the same mark.

use std::sync::Arc;
use std::time::Instant;

use rowcache_core::{RefreshError, RowStoreError};
use tokio::sync::Mutex;

use crate::cache::{CacheStore, MergeOutcome};
use crate::row_store::RowStore;

/// Drives loads from a row store into a cache.
pub struct CacheRefresher {
    store: Arc<dyn RowStore>,
    cache: Arc<CacheStore>,
    /// Held across read and merge so loads apply in the order they were read.
    load_lock: Mutex<()>,
}

impl CacheRefresher {
    pub fn new(store: Arc<dyn RowStore>, cache: Arc<CacheStore>) -> Self {
        Self {
            store,
            cache,
            load_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Read every row and merge it as the initial cache contents.
    ///
    /// Callers treat an error here as fatal: without a full load the cache
    /// has no mark and can never be refreshed.
    pub async fn full_load(&self) -> Result<MergeOutcome, RowStoreError> {
        let _guard = self.load_lock.lock().await;
        let started = Instant::now();

        let batch = match self.store.full_load().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(
                    backend = self.store.name(),
                    error = %e,
                    "Full load failed"
                );
                return Err(e);
            }
        };

        let (entries, read_timestamp) = batch.into_entries();
        let outcome = self.cache.merge_batch(entries, read_timestamp).await;

        tracing::info!(
            backend = self.store.name(),
            rows = outcome.rows(),
            high_water_mark = %outcome.high_water_mark,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Full load complete"
        );
        Ok(outcome)
    }

    /// Fetch rows modified since the current mark and merge them.
    ///
    /// On error the cache and its mark are left exactly as they were.
    pub async fn refresh_once(&self) -> Result<MergeOutcome, RefreshError> {
        let _guard = self.load_lock.lock().await;
        let started = Instant::now();

        let since = self
            .cache
            .high_water_mark()
            .await
            .ok_or(RefreshError::NotInitialized)?;

        let batch = self.store.incremental_load(since).await.map_err(|e| {
            tracing::warn!(
                backend = self.store.name(),
                since = %since,
                error = %e,
                "Incremental load failed, keeping current mark"
            );
            RefreshError::from(e)
        })?;

        let (entries, read_timestamp) = batch.into_entries();
        let outcome = self.cache.merge_batch(entries, read_timestamp).await;

        tracing::debug!(
            backend = self.store.name(),
            rows = outcome.rows(),
            inserted = outcome.inserted,
            overwritten = outcome.overwritten,
            since = %since,
            high_water_mark = %outcome.high_water_mark,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Incremental refresh merged"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for CacheRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRefresher")
            .field("backend", &self.store.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureRowStore;

    fn setup() -> (Arc<FixtureRowStore>, CacheRefresher) {
        let store = Arc::new(FixtureRowStore::new());
        let refresher = CacheRefresher::new(store.clone(), Arc::new(CacheStore::new()));
        (store, refresher)
    }

    #[tokio::test]
    async fn test_full_load_populates_cache_and_mark() {
        let (store, refresher) = setup();
        store.upsert("a", b"X".to_vec()).await;
        store.upsert("b", b"Y".to_vec()).await;

        let outcome = refresher.full_load().await.unwrap();

        let cache = refresher.cache();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(cache.get("a").await, Some(b"X".to_vec()));
        assert_eq!(cache.get("b").await, Some(b"Y".to_vec()));
        assert_eq!(cache.high_water_mark().await, Some(outcome.high_water_mark));
    }

    #[tokio::test]
    async fn test_refresh_before_full_load_is_rejected() {
        let (store, refresher) = setup();
        let err = refresher.refresh_once().await.unwrap_err();
        assert_eq!(err, RefreshError::NotInitialized);
        assert_eq!(store.incremental_load_count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_merges_updates_since_mark() {
        let (store, refresher) = setup();
        store.upsert("a", b"X".to_vec()).await;
        store.upsert("b", b"Y".to_vec()).await;
        let t0 = refresher.full_load().await.unwrap().high_water_mark;

        store.upsert("b", b"Y2".to_vec()).await;
        let outcome = refresher.refresh_once().await.unwrap();

        let cache = refresher.cache();
        assert_eq!(store.last_since().await, Some(t0));
        assert_eq!(outcome.overwritten, 1);
        assert_eq!(cache.get("a").await, Some(b"X".to_vec()));
        assert_eq!(cache.get("b").await, Some(b"Y2".to_vec()));
        assert!(outcome.high_water_mark.is_newer_than(&t0));
    }

    #[tokio::test]
    async fn test_empty_refresh_advances_mark_only() {
        let (store, refresher) = setup();
        store.upsert("a", b"X".to_vec()).await;
        let t1 = refresher.full_load().await.unwrap().high_water_mark;
        let before = refresher.cache().snapshot().await;

        let outcome = refresher.refresh_once().await.unwrap();

        assert_eq!(outcome.rows(), 0);
        assert!(outcome.high_water_mark.is_newer_than(&t1));
        assert_eq!(refresher.cache().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache_and_mark() {
        let (store, refresher) = setup();
        store.upsert("a", b"X".to_vec()).await;
        let t0 = refresher.full_load().await.unwrap().high_water_mark;

        store.upsert("b", b"Y".to_vec()).await;
        store
            .fail_next(RowStoreError::Query {
                reason: "deadline exceeded".to_string(),
            })
            .await;

        let err = refresher.refresh_once().await.unwrap_err();
        assert!(matches!(err, RefreshError::Store(RowStoreError::Query { .. })));
        assert_eq!(refresher.cache().high_water_mark().await, Some(t0));
        assert_eq!(refresher.cache().get("b").await, None);

        // The retry reads from the unchanged mark and picks up the row.
        refresher.refresh_once().await.unwrap();
        assert_eq!(store.last_since().await, Some(t0));
        assert_eq!(refresher.cache().get("b").await, Some(b"Y".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_full_load_leaves_cache_unready() {
        let (store, refresher) = setup();
        store
            .fail_next(RowStoreError::Connection {
                reason: "refused".to_string(),
            })
            .await;

        assert!(refresher.full_load().await.is_err());
        assert!(!refresher.cache().is_ready().await);
        assert!(matches!(
            refresher.refresh_once().await,
            Err(RefreshError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_repeated_refresh_is_idempotent() {
        let (store, refresher) = setup();
        store.upsert("a", b"X".to_vec()).await;
        refresher.full_load().await.unwrap();
        store.upsert("b", b"Y".to_vec()).await;

        refresher.refresh_once().await.unwrap();
        let after_first = refresher.cache().snapshot().await;
        refresher.refresh_once().await.unwrap();

        assert_eq!(refresher.cache().snapshot().await, after_first);
    }

    #[tokio::test]
    async fn test_marks_never_decrease_across_refreshes() {
        let (store, refresher) = setup();
        let mut last = refresher.full_load().await.unwrap().high_water_mark;
        for i in 0..10 {
            if i % 3 == 0 {
                store.upsert(format!("k{i}"), vec![i as u8]).await;
            }
            let mark = refresher.refresh_once().await.unwrap().high_water_mark;
            assert!(mark.is_at_least(&last));
            last = mark;
        }
        assert_eq!(refresher.cache().len().await, 4);
    }

    #[tokio::test]
    async fn test_late_commit_behind_mark_is_missed() {
        let (store, refresher) = setup();
        let mark = refresher.full_load().await.unwrap().high_water_mark;

        // Stamped before the read, visible only after it.
        store
            .upsert_at("late", b"L".to_vec(), mark.read_at - chrono::Duration::milliseconds(2))
            .await;
        refresher.refresh_once().await.unwrap();

        assert_eq!(refresher.cache().get("late").await, None);
    }

    #[tokio::test]
    async fn test_commit_lag_picks_up_late_commit() {
        let lag = chrono::Duration::milliseconds(5);
        let store = Arc::new(FixtureRowStore::with_commit_lag(lag));
        let refresher = CacheRefresher::new(store.clone(), Arc::new(CacheStore::new()));
        let mark = refresher.full_load().await.unwrap().high_water_mark;
        let read_at = mark.read_at + lag;

        store
            .upsert_at("late", b"L".to_vec(), read_at - chrono::Duration::milliseconds(2))
            .await;
        let outcome = refresher.refresh_once().await.unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(refresher.cache().get("late").await, Some(b"L".to_vec()));
        assert!(outcome.high_water_mark > mark);
    }

    #[tokio::test]
    async fn test_backend_name() {
        let (_store, refresher) = setup();
        assert_eq!(refresher.backend_name(), "fixture");
    }
}
