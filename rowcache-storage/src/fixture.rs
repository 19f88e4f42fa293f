//! In-memory row store.
//!
//! `FixtureRowStore` stands in for a real database in tests and in local
//! runs. It keeps a logical clock: every read and every upsert advances it
//! by one millisecond, so a row written after a read is always strictly
//! newer than that read's timestamp.

use std::collections::{BTreeMap, VecDeque};

use ::async_trait::async_trait;
use chrono::{DateTime, Duration};
use rowcache_core::{HighWaterMark, RawValue, Row, RowBatch, RowStoreError, RowStoreResult, Timestamp};
use tokio::sync::Mutex;

use crate::row_store::RowStore;

/// Logical clock origin. Fixed so test output is stable.
const CLOCK_ORIGIN_SECS: i64 = 1_600_000_000;

#[derive(Debug)]
struct FixtureState {
    rows: BTreeMap<String, Row>,
    clock: Timestamp,
    pending_failures: VecDeque<RowStoreError>,
    full_loads: u64,
    incremental_loads: u64,
    last_since: Option<HighWaterMark>,
    commit_lag: Duration,
}

impl FixtureState {
    fn tick(&mut self) -> Timestamp {
        self.clock += Duration::milliseconds(1);
        self.clock
    }

    /// Advance the clock for a read and return the mark to report.
    fn read_mark(&mut self) -> HighWaterMark {
        let read_at = self.tick();
        HighWaterMark::new(read_at - self.commit_lag)
    }
}

impl Default for FixtureState {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            clock: DateTime::from_timestamp(CLOCK_ORIGIN_SECS, 0).unwrap_or(DateTime::UNIX_EPOCH),
            pending_failures: VecDeque::new(),
            full_loads: 0,
            incremental_loads: 0,
            last_since: None,
            commit_lag: Duration::zero(),
        }
    }
}

/// Row store backed by an in-memory ordered map.
#[derive(Debug, Default)]
pub struct FixtureRowStore {
    state: Mutex<FixtureState>,
}

impl FixtureRowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose reported read timestamps trail the clock
    /// by `lag`, the way `PgRowStore` applies its commit lag.
    pub fn with_commit_lag(lag: Duration) -> Self {
        let state = FixtureState {
            commit_lag: lag,
            ..FixtureState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Store seeded with two sample rows.
    ///
    /// Values are encoded flag messages: `example.com/ad1` is not servable,
    /// `example.com/ad2` is.
    pub fn sample() -> Self {
        let mut state = FixtureState::default();
        for (key, value) in [
            ("example.com/ad1", vec![0x08, 0x00]),
            ("example.com/ad2", vec![0x08, 0x01]),
        ] {
            let modified = state.tick();
            state.rows.insert(key.to_string(), Row::new(key, value, modified));
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Insert or replace a row, stamping it with the next clock value.
    pub async fn upsert(&self, key: impl Into<String>, value: impl Into<RawValue>) -> Timestamp {
        let key = key.into();
        let mut state = self.state.lock().await;
        let modified = state.tick();
        state.rows.insert(key.clone(), Row::new(key, value, modified));
        modified
    }

    /// Insert a row with an explicit modification time. The clock is not
    /// touched, which lets tests model late-committing writers.
    pub async fn upsert_at(
        &self,
        key: impl Into<String>,
        value: impl Into<RawValue>,
        last_modified: Timestamp,
    ) {
        let key = key.into();
        let mut state = self.state.lock().await;
        state.rows.insert(key.clone(), Row::new(key, value, last_modified));
    }

    /// Move the clock forward without writing anything.
    pub async fn advance_clock(&self, by: Duration) -> Timestamp {
        let mut state = self.state.lock().await;
        state.clock += by;
        state.clock
    }

    /// Current clock value.
    pub async fn now(&self) -> Timestamp {
        self.state.lock().await.clock
    }

    /// Make the next read fail with `err`. Calls queue up.
    pub async fn fail_next(&self, err: RowStoreError) {
        self.state.lock().await.pending_failures.push_back(err);
    }

    /// Number of full loads attempted, failed ones included.
    pub async fn full_load_count(&self) -> u64 {
        self.state.lock().await.full_loads
    }

    /// Number of incremental loads attempted, failed ones included.
    pub async fn incremental_load_count(&self) -> u64 {
        self.state.lock().await.incremental_loads
    }

    /// The `since` argument of the most recent incremental read.
    pub async fn last_since(&self) -> Option<HighWaterMark> {
        self.state.lock().await.last_since
    }

    /// Number of distinct keys in the table.
    pub async fn row_count(&self) -> usize {
        self.state.lock().await.rows.len()
    }
}

#[async_trait]
impl RowStore for FixtureRowStore {
    async fn full_load(&self) -> RowStoreResult<RowBatch> {
        let mut state = self.state.lock().await;
        state.full_loads += 1;
        if let Some(err) = state.pending_failures.pop_front() {
            return Err(err);
        }

        let mark = state.read_mark();
        let rows = state.rows.values().cloned().collect();
        Ok(RowBatch::new(rows, mark))
    }

    async fn incremental_load(&self, since: HighWaterMark) -> RowStoreResult<RowBatch> {
        let mut state = self.state.lock().await;
        state.incremental_loads += 1;
        state.last_since = Some(since);
        if let Some(err) = state.pending_failures.pop_front() {
            return Err(err);
        }

        let mark = state.read_mark();
        let rows = state
            .rows
            .values()
            .filter(|row| since.admits(row.last_modified))
            .cloned()
            .collect();
        Ok(RowBatch::new(rows, mark))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
