//! Row store capability.
//!
//! A row store is the authoritative source the cache mirrors. It exposes
//! exactly two reads: every row, and every row modified after a given mark.
//! Both return the store's own read timestamp alongside the rows so the
//! caller can scope the next incremental read.

use ::async_trait::async_trait;
use rowcache_core::{HighWaterMark, RowBatch, RowStoreResult};

/// Async read access to a timestamped key/value table.
///
/// Implementations must return a `read_timestamp` such that every row
/// committed at or before it is visible in the batch. Rows committed later
/// may or may not be included; they are picked up again by the next
/// incremental read.
#[async_trait]
pub trait RowStore: Send + Sync {
    // ========================================================================
    // READS
    // ========================================================================

    /// Read every row currently in the store.
    async fn full_load(&self) -> RowStoreResult<RowBatch>;

    /// Read every row whose last-modified time is strictly after `since`.
    async fn incremental_load(&self, since: HighWaterMark) -> RowStoreResult<RowBatch>;

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Short backend name used in logs and metrics labels.
    fn name(&self) -> &'static str;
}
