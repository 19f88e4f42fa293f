//! Row and cache entry structures

use crate::{HighWaterMark, RawValue, Timestamp};
use serde::{Deserialize, Serialize};

/// One row as delivered by a row store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Unique identifier of the row.
    pub key: String,
    /// Opaque payload.
    pub value: RawValue,
    /// When the row was last modified in the row store.
    pub last_modified: Timestamp,
}

impl Row {
    pub fn new(key: impl Into<String>, value: impl Into<RawValue>, last_modified: Timestamp) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            last_modified,
        }
    }
}

/// A key/value pair ready to be merged into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: RawValue,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<Row> for CacheEntry {
    fn from(row: Row) -> Self {
        Self {
            key: row.key,
            value: row.value,
        }
    }
}

/// Result of a full or incremental load.
///
/// `read_timestamp` is the row store's own notion of when the read happened,
/// not the newest `last_modified` among the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    pub rows: Vec<Row>,
    pub read_timestamp: HighWaterMark,
}

impl RowBatch {
    pub fn new(rows: Vec<Row>, read_timestamp: HighWaterMark) -> Self {
        Self {
            rows,
            read_timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Newest `last_modified` among the rows, if any.
    pub fn newest_modification(&self) -> Option<Timestamp> {
        self.rows.iter().map(|r| r.last_modified).max()
    }

    /// Split into cache entries and the read timestamp.
    pub fn into_entries(self) -> (Vec<CacheEntry>, HighWaterMark) {
        let entries = self.rows.into_iter().map(CacheEntry::from).collect();
        (entries, self.read_timestamp)
    }
}
