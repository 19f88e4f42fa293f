//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres, and `PgRowStore`,
//! the row store that reads the mirrored table.
//!
//! Every load runs in its own `REPEATABLE READ, READ ONLY` transaction. The
//! first statement pins the snapshot and returns `transaction_timestamp()`,
//! so the rows and the read timestamp describe the same moment.

use std::time::Duration;

use ::async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use once_cell::sync::Lazy;
use regex::Regex;
use rowcache_core::{ConfigError, HighWaterMark, Row, RowBatch, RowStoreError, RowStoreResult};
use rowcache_storage::RowStore;
use tokio_postgres::{IsolationLevel, NoTls};

use crate::config::{invalid, parse_var, string_var};
use crate::constants::{
    DEFAULT_DB_COMMIT_LAG_MS, DEFAULT_DB_HOST, DEFAULT_DB_KEY_COLUMN, DEFAULT_DB_MODIFIED_COLUMN,
    DEFAULT_DB_NAME, DEFAULT_DB_POOL_SIZE, DEFAULT_DB_PORT, DEFAULT_DB_TABLE,
    DEFAULT_DB_TIMEOUT_SECS, DEFAULT_DB_USER, DEFAULT_DB_VALUE_COLUMN,
};
use crate::error::{ApiError, ApiResult};

/// Plain or schema-qualified SQL identifier. Quoted identifiers are not supported.
static TABLE_NAME: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$"));

static COLUMN_NAME: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"));

fn check_identifier(
    pattern: &Lazy<Result<Regex, regex::Error>>,
    field: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let re = pattern
        .as_ref()
        .map_err(|e| invalid(field, value, &format!("identifier pattern failed to compile: {}", e)))?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(invalid(field, value, "not a valid SQL identifier"))
    }
}

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool and table layout configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Mirrored table, optionally schema-qualified
    pub table: String,
    pub key_column: String,
    pub value_column: String,
    pub modified_column: String,
    /// Subtracted from every read timestamp
    pub commit_lag: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: "".to_string(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
            table: DEFAULT_DB_TABLE.to_string(),
            key_column: DEFAULT_DB_KEY_COLUMN.to_string(),
            value_column: DEFAULT_DB_VALUE_COLUMN.to_string(),
            modified_column: DEFAULT_DB_MODIFIED_COLUMN.to_string(),
            commit_lag: Duration::from_millis(DEFAULT_DB_COMMIT_LAG_MS),
        }
    }
}

impl DbConfig {
    /// Create a database configuration from environment variables.
    ///
    /// - `ROWCACHE_DB_HOST`, `ROWCACHE_DB_PORT`, `ROWCACHE_DB_NAME`,
    ///   `ROWCACHE_DB_USER`, `ROWCACHE_DB_PASSWORD`: connection
    /// - `ROWCACHE_DB_POOL_SIZE` (default: 4), `ROWCACHE_DB_TIMEOUT` (seconds, default: 30)
    /// - `ROWCACHE_DB_TABLE`, `ROWCACHE_DB_KEY_COLUMN`, `ROWCACHE_DB_VALUE_COLUMN`,
    ///   `ROWCACHE_DB_MODIFIED_COLUMN`: table layout
    /// - `ROWCACHE_DB_COMMIT_LAG_MS` (default: 0)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            host: string_var(&lookup, "ROWCACHE_DB_HOST", DEFAULT_DB_HOST),
            port: parse_var(&lookup, "ROWCACHE_DB_PORT", DEFAULT_DB_PORT)?,
            dbname: string_var(&lookup, "ROWCACHE_DB_NAME", DEFAULT_DB_NAME),
            user: string_var(&lookup, "ROWCACHE_DB_USER", DEFAULT_DB_USER),
            password: string_var(&lookup, "ROWCACHE_DB_PASSWORD", ""),
            max_size: parse_var(&lookup, "ROWCACHE_DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE)?,
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "ROWCACHE_DB_TIMEOUT",
                DEFAULT_DB_TIMEOUT_SECS,
            )?),
            table: string_var(&lookup, "ROWCACHE_DB_TABLE", DEFAULT_DB_TABLE),
            key_column: string_var(&lookup, "ROWCACHE_DB_KEY_COLUMN", DEFAULT_DB_KEY_COLUMN),
            value_column: string_var(&lookup, "ROWCACHE_DB_VALUE_COLUMN", DEFAULT_DB_VALUE_COLUMN),
            modified_column: string_var(
                &lookup,
                "ROWCACHE_DB_MODIFIED_COLUMN",
                DEFAULT_DB_MODIFIED_COLUMN,
            ),
            commit_lag: Duration::from_millis(parse_var(
                &lookup,
                "ROWCACHE_DB_COMMIT_LAG_MS",
                DEFAULT_DB_COMMIT_LAG_MS,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the table layout. Names end up inside SQL text, so anything
    /// that is not a bare identifier is refused.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(invalid("ROWCACHE_DB_POOL_SIZE", 0, "must be at least 1"));
        }
        check_identifier(&TABLE_NAME, "ROWCACHE_DB_TABLE", &self.table)?;
        check_identifier(&COLUMN_NAME, "ROWCACHE_DB_KEY_COLUMN", &self.key_column)?;
        check_identifier(&COLUMN_NAME, "ROWCACHE_DB_VALUE_COLUMN", &self.value_column)?;
        check_identifier(&COLUMN_NAME, "ROWCACHE_DB_MODIFIED_COLUMN", &self.modified_column)?;
        Ok(())
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }

    /// `SELECT key, value, modified FROM table`
    pub fn full_load_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {} FROM {}",
            self.key_column, self.value_column, self.modified_column, self.table
        )
    }

    /// Same as [`Self::full_load_sql`] restricted to rows modified after `$1`.
    pub fn incremental_load_sql(&self) -> String {
        format!("{} WHERE {} > $1", self.full_load_sql(), self.modified_column)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn query_error(err: tokio_postgres::Error) -> RowStoreError {
    if err.is_closed() {
        RowStoreError::Connection {
            reason: err.to_string(),
        }
    } else {
        RowStoreError::Query {
            reason: err.to_string(),
        }
    }
}

fn pool_error(err: PoolError) -> RowStoreError {
    match err {
        PoolError::Backend(e) => RowStoreError::Connection {
            reason: e.to_string(),
        },
        other => RowStoreError::Pool {
            reason: other.to_string(),
        },
    }
}

/// Decode one result row. Any deviation from the expected column types
/// fails the whole load.
fn decode_row(position: usize, row: &tokio_postgres::Row) -> RowStoreResult<Row> {
    let malformed = |reason: String| RowStoreError::MalformedRow { position, reason };

    let key: Option<String> = row
        .try_get(0)
        .map_err(|e| malformed(format!("key column: {}", e)))?;
    let key = key.ok_or_else(|| malformed("NULL key".to_string()))?;

    let value: Option<Vec<u8>> = row
        .try_get(1)
        .map_err(|e| malformed(format!("value column: {}", e)))?;
    let value = value.ok_or_else(|| malformed(format!("NULL value for key {}", key)))?;

    let modified: Option<DateTime<Utc>> = row
        .try_get(2)
        .map_err(|e| malformed(format!("modified column: {}", e)))?;
    let modified = modified.ok_or_else(|| malformed(format!("NULL modification time for key {}", key)))?;

    Ok(Row::new(key, value, modified))
}

// ============================================================================
// POSTGRES ROW STORE
// ============================================================================

/// Row store reading a PostgreSQL table.
#[derive(Clone)]
pub struct PgRowStore {
    pool: Pool,
    full_load_sql: String,
    incremental_load_sql: String,
    commit_lag: chrono::Duration,
}

impl PgRowStore {
    pub fn new(pool: Pool, config: &DbConfig) -> Self {
        Self {
            pool,
            full_load_sql: config.full_load_sql(),
            incremental_load_sql: config.incremental_load_sql(),
            commit_lag: chrono::Duration::from_std(config.commit_lag)
                .unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }

    /// Create a row store with its own pool.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool, config))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Verify connectivity with a trivial query.
    pub async fn health_check(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Run `sql` inside a snapshot transaction and pair the rows with the
    /// snapshot's timestamp.
    async fn load(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> RowStoreResult<RowBatch> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(query_error)?;

        let read_at: DateTime<Utc> = tx
            .query_one("SELECT transaction_timestamp()", &[])
            .await
            .map_err(query_error)?
            .try_get(0)
            .map_err(query_error)?;

        let rows = tx.query(sql, params).await.map_err(query_error)?;
        let rows = rows
            .iter()
            .enumerate()
            .map(|(position, row)| decode_row(position, row))
            .collect::<RowStoreResult<Vec<Row>>>()?;

        tx.commit().await.map_err(query_error)?;

        Ok(RowBatch::new(rows, HighWaterMark::new(read_at - self.commit_lag)))
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn full_load(&self) -> RowStoreResult<RowBatch> {
        self.load(&self.full_load_sql, &[]).await
    }

    async fn incremental_load(&self, since: HighWaterMark) -> RowStoreResult<RowBatch> {
        self.load(&self.incremental_load_sql, &[&since.read_at]).await
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
