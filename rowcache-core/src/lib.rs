//! Rowcache Core - Data Types
//!
//! Pure data structures shared by the cache, the row store adapters and the
//! HTTP layer. This crate performs no I/O.

pub mod entities;
pub mod error;
pub mod lookup;
pub mod watermark;

pub use entities::{CacheEntry, Row, RowBatch};
pub use error::{ConfigError, RefreshError, RowStoreError, RowStoreResult, ValidationError};
pub use lookup::{LookupEntry, LookupRequest, LookupResult};
pub use watermark::HighWaterMark;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Opaque value bytes. The cache never interprets them.
pub type RawValue = Vec<u8>;
