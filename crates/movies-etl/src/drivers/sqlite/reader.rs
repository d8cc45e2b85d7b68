//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait using SQLx. The database is opened
//! read-only over a single pooled connection and each table is streamed with
//! one cursor, cut into pages of `batch_size` rows.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::traits::{ReadOptions, SourceReader};
use crate::core::value::{Batch, SqlValue};
use crate::drivers::Dialect;
use crate::error::{MigrateError, Result};

use super::dialect::SqliteDialect;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteReader {
    /// Open the configured SQLite file.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        Self::open(&config.sqlite_path).await
    }

    /// Open a SQLite file read-only.
    ///
    /// Fails with `SourceUnavailable` when the file is missing or unreadable.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::source(format!("cannot open {}: {}", path.display(), e)))?;

        let reader = Self {
            pool,
            path: path.to_path_buf(),
        };
        reader.test_connection().await?;

        info!("Connected to SQLite source: {}", path.display());
        Ok(reader)
    }

    /// Decode one row by the storage class of each value.
    fn row_to_values(row: &SqliteRow, table: &str) -> Result<Vec<SqlValue>> {
        (0..row.len())
            .map(|i| {
                let raw = row
                    .try_get_raw(i)
                    .map_err(|e| MigrateError::source_table(table, e))?;
                if raw.is_null() {
                    return Ok(SqlValue::Null);
                }

                let storage = raw.type_info().name().to_string();
                let value = match storage.as_str() {
                    "INTEGER" => row.try_get::<i64, _>(i).map(SqlValue::I64),
                    "REAL" => row.try_get::<f64, _>(i).map(SqlValue::F64),
                    "BLOB" => row.try_get::<Vec<u8>, _>(i).map(SqlValue::Bytes),
                    _ => row.try_get::<String, _>(i).map(SqlValue::Text),
                };
                value.map_err(|e| {
                    MigrateError::source_table(table, format!("column {}: {}", i, e))
                })
            })
            .collect()
    }

    async fn read_rows_impl(
        pool: SqlitePool,
        opts: ReadOptions,
        tx: mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        let sql = SqliteDialect.build_select_query(&opts.table, &opts.columns);
        let batch_size = opts.batch_size.max(1);
        let mut rows = sqlx::query(&sql).fetch(&pool);

        let mut page = 0usize;
        let mut buf = Vec::with_capacity(batch_size);

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| MigrateError::source_table(&opts.table, e))?
        {
            buf.push(Self::row_to_values(&row, &opts.table)?);

            if buf.len() == batch_size {
                let full = std::mem::replace(&mut buf, Vec::with_capacity(batch_size));
                if tx.send(Ok(Batch::new(full).with_page(page))).await.is_err() {
                    debug!("{}: reader stopped, receiver dropped", opts.table);
                    return Ok(());
                }
                page += 1;
            }
        }

        if !buf.is_empty() {
            let _ = tx.send(Ok(Batch::new(buf).with_page(page))).await;
        }

        Ok(())
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(MigrateError::source)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(MigrateError::source))
            .collect()
    }

    async fn headers(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM pragma_table_info({}) ORDER BY cid",
            crate::core::value::quote_literal(table)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::source_table(table, e))?;

        if rows.is_empty() {
            return Err(MigrateError::source_table(table, "no such table"));
        }

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .map_err(|e| MigrateError::source_table(table, e))
            })
            .collect()
    }

    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(1);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let result = Self::read_rows_impl(pool, opts, tx.clone()).await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = SqliteDialect.build_count_query(table);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::source_table(table, e))?;

        row.try_get::<i64, _>(0)
            .map_err(|e| MigrateError::source_table(table, e))
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                MigrateError::source(format!("cannot query {}: {}", self.path.display(), e))
            })?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
