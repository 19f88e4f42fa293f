//! Cache Refresh Background Task
//!
//! Periodically pulls rows modified since the cache's high-water mark and
//! merges them. The initial full load happens at startup, before this task
//! is spawned, so the first refresh waits one full period.
//!
//! A failed cycle is logged and counted; the cache and its mark stay as they
//! were and the next tick retries from the same mark.
//!
//! Cache gauges are published after the startup load and after every cycle.
//!
//! # Configuration
//!
//! ```rust
//! use rowcache_api::jobs::CacheRefreshConfig;
//! use std::time::Duration;
//!
//! let config = CacheRefreshConfig {
//!     period: Duration::from_secs(60),
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rowcache_storage::{CacheRefresher, CacheStore, MergeOutcome};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::ServiceConfig;
use crate::constants::DEFAULT_REFRESH_PERIOD_SECS;
use crate::error::ApiResult;
use crate::telemetry::METRICS;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the cache refresh task.
#[derive(Debug, Clone)]
pub struct CacheRefreshConfig {
    /// Time between incremental refreshes (default: 600 seconds)
    pub period: Duration,
}

impl Default for CacheRefreshConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(DEFAULT_REFRESH_PERIOD_SECS),
        }
    }
}

impl From<&ServiceConfig> for CacheRefreshConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            period: config.refresh_period,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for refresh activity.
#[derive(Debug, Default)]
pub struct CacheRefreshMetrics {
    /// Refresh cycles attempted since startup
    pub cycles: AtomicU64,

    /// Cycles that failed to read from the row store
    pub failures: AtomicU64,

    /// Failures since the last successful cycle
    pub consecutive_failures: AtomicU64,

    /// Rows merged across all successful cycles
    pub rows_merged: AtomicU64,
}

impl CacheRefreshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> CacheRefreshSnapshot {
        CacheRefreshSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            rows_merged: self.rows_merged.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of refresh counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheRefreshSnapshot {
    pub cycles: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub rows_merged: u64,
}

// ============================================================================
// STARTUP LOAD
// ============================================================================

/// Fill the cache with a full load and publish its gauges.
///
/// Must succeed before the server accepts traffic.
pub async fn initial_load(refresher: &CacheRefresher) -> ApiResult<MergeOutcome> {
    let outcome = refresher.full_load().await?;
    publish_cache_gauges(refresher.cache()).await;

    tracing::info!(
        backend = refresher.backend_name(),
        rows = outcome.rows(),
        high_water_mark = %outcome.high_water_mark,
        "Cache ready"
    );
    Ok(outcome)
}

async fn publish_cache_gauges(cache: &CacheStore) {
    if let Ok(prom) = METRICS.as_ref() {
        prom.observe_cache(&cache.stats().await);
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that refreshes the cache until shutdown is signalled.
///
/// `metrics` is shared with the health endpoint; the same handle is returned
/// when the task exits.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let metrics = Arc::new(CacheRefreshMetrics::new());
/// let handle = tokio::spawn(cache_refresh_task(
///     refresher,
///     CacheRefreshConfig::default(),
///     Arc::clone(&metrics),
///     shutdown_rx,
/// ));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn cache_refresh_task(
    refresher: Arc<CacheRefresher>,
    config: CacheRefreshConfig,
    metrics: Arc<CacheRefreshMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CacheRefreshMetrics> {
    // First tick one period out: the full load has just run.
    let mut ticker = interval_at(Instant::now() + config.period, config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        backend = refresher.backend_name(),
        period_secs = config.period.as_secs(),
        "Cache refresh task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Cache refresh task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                refresh_cycle(&refresher, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        failures = snapshot.failures,
        rows_merged = snapshot.rows_merged,
        "Cache refresh task completed"
    );

    metrics
}

/// Perform one refresh and record its outcome.
async fn refresh_cycle(refresher: &CacheRefresher, metrics: &CacheRefreshMetrics) {
    metrics.cycles.fetch_add(1, Ordering::Relaxed);

    let success = match refresher.refresh_once().await {
        Ok(outcome) => {
            metrics.consecutive_failures.store(0, Ordering::Relaxed);
            metrics
                .rows_merged
                .fetch_add(outcome.rows() as u64, Ordering::Relaxed);

            if outcome.rows() > 0 {
                tracing::info!(
                    rows = outcome.rows(),
                    inserted = outcome.inserted,
                    overwritten = outcome.overwritten,
                    high_water_mark = %outcome.high_water_mark,
                    "Cache refresh cycle completed"
                );
            } else {
                tracing::trace!("Cache refresh cycle completed with no changes");
            }
            true
        }
        Err(e) => {
            metrics.failures.fetch_add(1, Ordering::Relaxed);
            let consecutive = metrics.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::error!(
                error = %e,
                consecutive_failures = consecutive,
                "Cache refresh cycle failed, retrying next period"
            );
            false
        }
    };

    if let Ok(prom) = METRICS.as_ref() {
        prom.record_refresh_cycle(success);
    }
    publish_cache_gauges(refresher.cache()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_core::RowStoreError;
    use rowcache_storage::{CacheStore, FixtureRowStore};

    async fn loaded() -> (Arc<FixtureRowStore>, Arc<CacheRefresher>) {
        let store = Arc::new(FixtureRowStore::new());
        store.upsert("a", b"X".to_vec()).await;
        let refresher = Arc::new(CacheRefresher::new(
            store.clone(),
            Arc::new(CacheStore::new()),
        ));
        refresher.full_load().await.unwrap();
        (store, refresher)
    }

    fn config(secs: u64) -> CacheRefreshConfig {
        CacheRefreshConfig {
            period: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_config_default() {
        assert_eq!(
            CacheRefreshConfig::default().period,
            Duration::from_secs(DEFAULT_REFRESH_PERIOD_SECS)
        );
    }

    #[test]
    fn test_config_from_service_config() {
        let service = ServiceConfig {
            refresh_period: Duration::from_secs(7),
            ..Default::default()
        };
        assert_eq!(CacheRefreshConfig::from(&service).period, Duration::from_secs(7));
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = CacheRefreshMetrics::new();
        metrics.cycles.store(4, Ordering::Relaxed);
        metrics.failures.store(1, Ordering::Relaxed);
        metrics.rows_merged.store(9, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 4);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.rows_merged, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_refreshes_each_period() {
        let (store, refresher) = loaded().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(CacheRefreshMetrics::new());
        let handle = tokio::spawn(cache_refresh_task(
            Arc::clone(&refresher),
            config(10),
            Arc::clone(&metrics),
            shutdown_rx,
        ));

        // Nothing happens before the first period elapses.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(metrics.snapshot().cycles, 0);

        store.upsert("b", b"Y".to_vec()).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(metrics.snapshot().cycles, 1);
        assert_eq!(refresher.cache().get("b").await, Some(b"Y".to_vec()));

        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.rows_merged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_survives_failed_cycle() {
        let (store, refresher) = loaded().await;
        let mark = refresher.cache().high_water_mark().await;
        store
            .fail_next(RowStoreError::Connection {
                reason: "refused".to_string(),
            })
            .await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(CacheRefreshMetrics::new());
        let handle = tokio::spawn(cache_refresh_task(
            Arc::clone(&refresher),
            config(10),
            Arc::clone(&metrics),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(11)).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(refresher.cache().high_water_mark().await, mark);

        // The next cycle succeeds and clears the failure streak.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(refresher.cache().high_water_mark().await > mark);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stops_on_shutdown() {
        let (_store, refresher) = loaded().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(cache_refresh_task(
            refresher,
            config(600),
            Arc::new(CacheRefreshMetrics::new()),
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();
        assert_eq!(metrics.snapshot().cycles, 0);
    }
}
