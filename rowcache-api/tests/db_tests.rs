//! PostgreSQL row store tests.
//!
//! Require a reachable database configured through the `ROWCACHE_DB_*`
//! variables. Run with `--features db-tests`.

#![cfg(feature = "db-tests")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use deadpool_postgres::Pool;
use rowcache_api::{ApiResult, DbConfig, PgRowStore};
use rowcache_core::HighWaterMark;
use rowcache_storage::{CacheRefresher, CacheStore, RowStore};

static TABLE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Fresh table per test, so tests can run concurrently.
async fn test_table() -> ApiResult<(DbConfig, Pool)> {
    let mut config = DbConfig::from_env()?;
    config.table = format!(
        "rowcache_test_{}_{}",
        std::process::id(),
        TABLE_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    let pool = config.create_pool()?;
    let conn = pool.get().await?;
    conn.batch_execute(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             {key} TEXT PRIMARY KEY,
             {value} BYTEA NOT NULL,
             {modified} TIMESTAMPTZ NOT NULL DEFAULT now()
         );",
        table = config.table,
        key = config.key_column,
        value = config.value_column,
        modified = config.modified_column,
    ))
    .await?;
    Ok((config, pool))
}

async fn upsert(pool: &Pool, config: &DbConfig, key: &str, value: &[u8]) -> ApiResult<()> {
    let conn = pool.get().await?;
    conn.execute(
        &format!(
            "INSERT INTO {table} ({key}, {value}, {modified}) VALUES ($1, $2, now())
             ON CONFLICT ({key}) DO UPDATE SET {value} = EXCLUDED.{value}, {modified} = now()",
            table = config.table,
            key = config.key_column,
            value = config.value_column,
            modified = config.modified_column,
        ),
        &[&key, &value],
    )
    .await?;
    Ok(())
}

async fn drop_table(pool: &Pool, config: &DbConfig) -> ApiResult<()> {
    let conn = pool.get().await?;
    conn.batch_execute(&format!("DROP TABLE IF EXISTS {}", config.table))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_health_check() -> ApiResult<()> {
    let (config, pool) = test_table().await?;
    let store = PgRowStore::new(pool.clone(), &config);
    store.health_check().await?;
    drop_table(&pool, &config).await
}

#[tokio::test]
async fn test_full_load_returns_all_rows() -> ApiResult<()> {
    let (config, pool) = test_table().await?;
    upsert(&pool, &config, "example.com/ad1", &[0x08, 0x00]).await?;
    upsert(&pool, &config, "example.com/ad2", &[0x08, 0x01]).await?;

    let store = PgRowStore::new(pool.clone(), &config);
    let batch = store.full_load().await?;

    assert_eq!(batch.len(), 2);
    let newest = batch.newest_modification().ok_or_else(|| {
        rowcache_api::ApiError::internal_error("batch has no rows")
    })?;
    assert!(batch.read_timestamp.read_at >= newest);

    drop_table(&pool, &config).await
}

#[tokio::test]
async fn test_incremental_load_is_strictly_after_mark() -> ApiResult<()> {
    let (config, pool) = test_table().await?;
    upsert(&pool, &config, "a", b"X").await?;

    let store = PgRowStore::new(pool.clone(), &config);
    let first = store.full_load().await?;

    let unchanged = store.incremental_load(first.read_timestamp).await?;
    assert!(unchanged.is_empty());
    assert!(unchanged.read_timestamp.is_at_least(&first.read_timestamp));

    upsert(&pool, &config, "b", b"Y").await?;
    let changed = store.incremental_load(first.read_timestamp).await?;
    assert_eq!(changed.len(), 1);
    assert_eq!(changed.rows[0].key, "b");

    let everything = store.incremental_load(HighWaterMark::epoch()).await?;
    assert_eq!(everything.len(), 2);

    drop_table(&pool, &config).await
}

#[tokio::test]
async fn test_refresher_over_postgres() -> ApiResult<()> {
    let (config, pool) = test_table().await?;
    upsert(&pool, &config, "a", b"X").await?;
    upsert(&pool, &config, "b", b"Y").await?;

    let refresher = CacheRefresher::new(
        Arc::new(PgRowStore::new(pool.clone(), &config)),
        Arc::new(CacheStore::new()),
    );
    refresher.full_load().await?;
    assert_eq!(refresher.cache().get("a").await, Some(b"X".to_vec()));

    upsert(&pool, &config, "a", b"X2").await?;
    refresher.refresh_once().await?;
    assert_eq!(refresher.cache().get("a").await, Some(b"X2".to_vec()));
    assert_eq!(refresher.cache().get("b").await, Some(b"Y".to_vec()));

    drop_table(&pool, &config).await
}
