//! In-process cache of the row store.
//!
//! The cache holds every key ever merged along with the high-water mark of
//! the most recent successful load. It is read by any number of lookups and
//! written only by the refresher.
//!
//! # Concurrency
//!
//! A single reader/writer lock guards both the mapping and the mark. Readers
//! share the lock; a merge takes it exclusively for the duration of the
//! batch, so no reader ever sees half of a merge.
//!
//! # Example
//!
//! ```ignore
//! let cache = CacheStore::new();
//! cache.merge_batch(entries, read_timestamp).await;
//!
//! let value = cache.get("example.com/ad1").await;
//! ```

pub mod store;

pub use store::{CacheStats, CacheStore, MergeOutcome};
