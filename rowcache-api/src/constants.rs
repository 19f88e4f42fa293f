//! Constants for the rowcache API
//!
//! Defaults for every environment-driven setting live here so they can be
//! found, changed and tested in one place.

// ============================================================================
// SERVER
// ============================================================================

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// LOOKUP
// ============================================================================

/// Default name of the query parameter carrying the key list
pub const DEFAULT_KEY_PARAM: &str = "keys";

/// Default maximum number of keys accepted in one request
pub const DEFAULT_MAX_KEYS: usize = 1000;

// ============================================================================
// REFRESH
// ============================================================================

/// Default interval between incremental refreshes in seconds (10 minutes)
pub const DEFAULT_REFRESH_PERIOD_SECS: u64 = 600;

// ============================================================================
// DATABASE
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "rowcache";
pub const DEFAULT_DB_USER: &str = "postgres";

/// Default pool size. Only the refresher talks to the database.
pub const DEFAULT_DB_POOL_SIZE: usize = 4;

/// Default connection timeout in seconds
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_DB_TABLE: &str = "cache_rows";
pub const DEFAULT_DB_KEY_COLUMN: &str = "row_key";
pub const DEFAULT_DB_VALUE_COLUMN: &str = "row_value";
pub const DEFAULT_DB_MODIFIED_COLUMN: &str = "last_modified";

/// Default allowance for writers that commit after stamping `last_modified`
pub const DEFAULT_DB_COMMIT_LAG_MS: u64 = 0;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "rowcache_api=debug,rowcache_storage=info,info";
