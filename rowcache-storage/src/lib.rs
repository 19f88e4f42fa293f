//! Rowcache Storage - Cache Store and Refresh Protocol
//!
//! Holds the in-process cache, the row store abstraction it mirrors, and the
//! refresher that keeps the two in step. The Postgres row store lives in
//! rowcache-api next to the connection pool.

pub mod cache;
pub mod fixture;
pub mod lookup;
pub mod refresh;
pub mod row_store;

pub use cache::{CacheStats, CacheStore, MergeOutcome};
pub use fixture::FixtureRowStore;
pub use lookup::LookupService;
pub use refresh::CacheRefresher;
pub use row_store::RowStore;

// ============================================================================
// TESTS
// ============================================================================
