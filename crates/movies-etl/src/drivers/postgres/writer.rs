//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait on top of deadpool-postgres. Every
//! page is one multi-row `INSERT ... ON CONFLICT DO NOTHING` inside its own
//! transaction, so a page lands completely or not at all and re-running a
//! migration never duplicates rows.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::error::SqlState;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::traits::TargetWriter;
use crate::core::value::{Batch, Row, SqlValue};
use crate::drivers::Dialect;
use crate::error::{MigrateError, Result};

use super::dialect::PostgresDialect;
use super::tls::TlsBuilder;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target writer implementation.
pub struct PostgresWriter {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresWriter {
    /// Connect to the destination and verify the session.
    ///
    /// The pool holds a single connection: the run is one sequential session.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("movies-etl");

        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?
            }
            Some(tls_connector) => {
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?
            }
        };

        let writer = Self {
            pool,
            dialect: PostgresDialect::new(&config.schema),
        };
        writer.test_connection().await?;

        info!(
            "Connected to PostgreSQL target: {} (schema {})",
            config.display_location(),
            config.schema
        );

        Ok(writer)
    }

}

/// Map a failed insert or commit onto the error taxonomy.
///
/// Deferred foreign keys are only checked at commit, so both statements go
/// through here.
fn classify_insert_error(table: &str, err: tokio_postgres::Error) -> MigrateError {
    let message = match err.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({})", db.message(), detail),
            None => db.message().to_string(),
        },
        None => err.to_string(),
    };
    rejected_row_error(table, err.code(), message).unwrap_or(MigrateError::Target(err))
}

/// `IntegrityViolation` for constraint (class 23) and data (class 22)
/// errors, which mean the server rejected a row. `None` for connection and
/// server failures.
fn rejected_row_error(table: &str, code: Option<&SqlState>, message: String) -> Option<MigrateError> {
    let code = code?.code();
    if code.starts_with("23") || code.starts_with("22") {
        Some(MigrateError::integrity(table, message))
    } else {
        None
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        batch: Batch,
        conflict_keys: &[Vec<String>],
    ) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let sql = self
            .dialect
            .build_insert_ignore(table, columns, &batch.rows, conflict_keys);

        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))?;

        let tx = client.transaction().await?;
        let inserted = tx
            .execute(sql.as_str(), &[])
            .await
            .map_err(|e| classify_insert_error(table, e))?;
        tx.commit()
            .await
            .map_err(|e| classify_insert_error(table, e))?;

        debug!(
            "{}: page {} inserted {}/{} rows",
            table,
            batch.page,
            inserted,
            batch.len()
        );
        Ok(inserted)
    }

    async fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        key_column: &str,
        keys: &[SqlValue],
    ) -> Result<Vec<Row>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))?;

        let sql = self
            .dialect
            .build_fetch_by_key(table, columns, key_column, keys);
        let rows = client.query(sql.as_str(), &[]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| SqlValue::from(row.get::<_, Option<String>>(i)))
                    .collect()
            })
            .collect())
    }

    async fn referenced_tables(&self, table: &str) -> Result<Vec<String>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))?;

        let schema = self.dialect.schema();
        let rows = client
            .query(self.dialect.referenced_tables_query(), &[&schema, &table])
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<_, String>(0))
            .filter(|referenced| referenced != table)
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))?;

        let sql = self.dialect.build_count_query(table);
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get::<_, i64>(0))
    }

    async fn test_connection(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        self.dialect.name()
    }

    async fn close(&self) {
        self.pool.close();
    }
}
