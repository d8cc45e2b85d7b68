//! Core traits for store-agnostic data migration.
//!
//! - [`SourceReader`]: enumerates tables and streams rows out of the source
//! - [`TargetWriter`]: idempotent page inserts into the destination
//!
//! The orchestrator only talks to these traits, so the transfer routine can
//! be exercised against in-memory stores in tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::value::{Batch, Row, SqlValue};

/// Options for reading rows from a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Table name.
    pub table: String,
    /// Columns to read, in the order rows should carry them.
    pub columns: Vec<String>,
    /// Number of rows per batch.
    pub batch_size: usize,
}

impl ReadOptions {
    /// Read `columns` from `table` in pages of `batch_size` rows.
    pub fn new(table: impl Into<String>, columns: Vec<String>, batch_size: usize) -> Self {
        Self {
            table: table.into(),
            columns,
            batch_size,
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            table: String::new(),
            columns: Vec::new(),
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Read tables and rows from a source store.
///
/// # Streaming
///
/// [`read_rows`](SourceReader::read_rows) returns a channel receiver. The
/// stream is finite and single-pass: it yields `Ok(batch)` pages until the
/// table is exhausted, or a single `Err` after which nothing more arrives.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user tables in the source.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column names of a table in declared order.
    ///
    /// Fails with `SourceUnavailable` if the table does not exist.
    async fn headers(&self, table: &str) -> Result<Vec<String>>;

    /// Start streaming rows from a table.
    ///
    /// Every row has exactly `opts.columns.len()` values in `opts.columns`
    /// order, and every batch holds at most `opts.batch_size` rows.
    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>>;

    /// Exact row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Check that the source answers queries.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}

/// Write pages of rows into a destination store.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Insert one page in a single committed transaction.
    ///
    /// Rows colliding with an existing row on any of `conflict_keys` are
    /// skipped. Returns the number of rows actually inserted. Any other
    /// constraint failure is an `IntegrityViolation` and nothing from this
    /// page is kept; earlier pages stay committed.
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        batch: Batch,
        conflict_keys: &[Vec<String>],
    ) -> Result<u64>;

    /// Rows of `table` whose `key_column` equals one of `keys`, in no
    /// particular order, each carrying `columns` in that order.
    async fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        key_column: &str,
        keys: &[SqlValue],
    ) -> Result<Vec<Row>>;

    /// Tables that `table` holds foreign-key constraints into.
    async fn referenced_tables(&self, table: &str) -> Result<Vec<String>>;

    /// Exact row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Check that the destination answers queries.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_options_default() {
        let opts = ReadOptions::default();
        assert_eq!(opts.batch_size, 200);
        assert!(opts.columns.is_empty());
    }

    #[test]
    fn test_read_options_new() {
        let opts = ReadOptions::new("genre", vec!["id".into(), "name".into()], 50);
        assert_eq!(opts.table, "genre");
        assert_eq!(opts.columns.len(), 2);
        assert_eq!(opts.batch_size, 50);
    }
}
