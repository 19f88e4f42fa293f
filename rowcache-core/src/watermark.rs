//! High-water mark bounding incremental refresh queries.
//!
//! The mark is the read timestamp reported by the row store for the most
//! recent successful load. Every row modified at or before the mark is
//! reflected in the cache.

use crate::Timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the row store's modification history.
///
/// Marks are totally ordered by their read timestamp. The cache only ever
/// moves its mark forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HighWaterMark {
    /// Read timestamp reported by the row store.
    pub read_at: Timestamp,
}

impl HighWaterMark {
    /// Create a mark at the given read timestamp.
    pub fn new(read_at: Timestamp) -> Self {
        Self { read_at }
    }

    /// The beginning of time. Every row is newer than this mark.
    pub fn epoch() -> Self {
        Self {
            read_at: DateTime::UNIX_EPOCH,
        }
    }

    /// Check if this mark is strictly newer than another.
    pub fn is_newer_than(&self, other: &HighWaterMark) -> bool {
        self.read_at > other.read_at
    }

    /// Check if this mark is at least as fresh as another.
    pub fn is_at_least(&self, other: &HighWaterMark) -> bool {
        self.read_at >= other.read_at
    }

    /// Whether a row last modified at `modified_at` falls after this mark.
    pub fn admits(&self, modified_at: Timestamp) -> bool {
        modified_at > self.read_at
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn as_epoch_seconds(&self) -> f64 {
        self.read_at.timestamp_micros() as f64 / 1_000_000.0
    }

    /// Time elapsed between this mark and `now`. Zero if the mark is in the future.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.read_at).to_std().unwrap_or_default()
    }
}

impl Default for HighWaterMark {
    fn default() -> Self {
        Self::epoch()
    }
}

impl From<Timestamp> for HighWaterMark {
    fn from(read_at: Timestamp) -> Self {
        Self::new(read_at)
    }
}

impl fmt::Display for HighWaterMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.read_at.to_rfc3339())
    }
}
