//! In-memory stores for exercising the transfer routine without databases.
//!
//! [`MemorySource`] serves fixed tables. [`MemoryTarget`] keeps committed
//! rows per table and enforces declared unique constraints and foreign keys
//! the way PostgreSQL does for `INSERT ... ON CONFLICT DO NOTHING`: a
//! collision on a targeted key (or on any key when untargeted) is a skip,
//! anything else rejects the whole page. Foreign keys are checked per row,
//! or once at commit when declared deferrable like Django's.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::traits::{ReadOptions, SourceReader, TargetWriter};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone)]
struct SourceTable {
    headers: Vec<String>,
    rows: Vec<Row>,
}

/// Fixed source tables.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<String, SourceTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, headers: &[&str], rows: Vec<Row>) -> Self {
        self.tables.insert(
            name.to_string(),
            SourceTable {
                headers: headers.iter().map(|h| h.to_string()).collect(),
                rows,
            },
        );
        self
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn headers(&self, table: &str) -> Result<Vec<String>> {
        self.tables
            .get(table)
            .map(|t| t.headers.clone())
            .ok_or_else(|| MigrateError::source_table(table, "no such table"))
    }

    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let pages: Vec<Result<Batch>> = match self.tables.get(&opts.table) {
            None => vec![Err(MigrateError::source_table(&opts.table, "no such table"))],
            Some(t) => {
                let positions: Option<Vec<usize>> = opts
                    .columns
                    .iter()
                    .map(|c| t.headers.iter().position(|h| h == c))
                    .collect();
                match positions {
                    None => vec![Err(MigrateError::source_table(&opts.table, "no such column"))],
                    Some(positions) => t
                        .rows
                        .chunks(opts.batch_size.max(1))
                        .enumerate()
                        .map(|(page, chunk)| {
                            let rows = chunk
                                .iter()
                                .map(|r| positions.iter().map(|&i| r[i].clone()).collect())
                                .collect();
                            Ok(Batch::new(rows).with_page(page))
                        })
                        .collect(),
                }
            }
        };

        let (tx, rx) = mpsc::channel(pages.len().max(1));
        for page in pages {
            let _ = tx.try_send(page);
        }
        rx
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        self.tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| MigrateError::source_table(table, "no such table"))
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[derive(Debug, Clone)]
struct ForeignKey {
    column: String,
    references: String,
    referenced_column: String,
    deferred: bool,
}

#[derive(Debug, Clone, Default)]
struct TargetTable {
    columns: Vec<String>,
    unique: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
    rows: Vec<Row>,
}

impl TargetTable {
    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    fn key_of(&self, row: &Row, key: &[String]) -> Option<Vec<SqlValue>> {
        let values: Vec<SqlValue> = key
            .iter()
            .filter_map(|c| self.position(c).map(|i| row[i].clone()))
            .collect();
        if values.len() != key.len() || values.iter().any(SqlValue::is_null) {
            return None;
        }
        Some(values)
    }
}

/// First foreign key of `row` (immediate or deferred ones, per `deferred`)
/// whose value has no parent row.
fn missing_parent(
    tables: &HashMap<String, TargetTable>,
    target: &TargetTable,
    row: &Row,
    deferred: bool,
) -> Option<String> {
    target
        .foreign_keys
        .iter()
        .filter(|fk| fk.deferred == deferred)
        .find(|fk| {
            let value = &row[target.position(&fk.column).expect("fk column")];
            !value.is_null()
                && !tables.get(&fk.references).is_some_and(|parent| {
                    let i = parent.position(&fk.referenced_column).expect("referenced column");
                    parent.rows.iter().any(|r| &r[i] == value)
                })
        })
        .map(|fk| {
            format!(
                "insert violates foreign key constraint: {} not present in {}",
                fk.column, fk.references
            )
        })
}

/// Destination tables with unique constraints and foreign keys.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    tables: Mutex<HashMap<String, TargetTable>>,
    commits: Mutex<Vec<(String, usize)>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(self, name: &str, columns: &[&str], unique: &[&[&str]]) -> Self {
        let table = TargetTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: unique
                .iter()
                .map(|k| k.iter().map(|c| c.to_string()).collect())
                .collect(),
            ..Default::default()
        };
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), table);
        self
    }

    pub fn foreign_key(self, table: &str, column: &str, references: &str) -> Self {
        self.add_foreign_key(table, column, references, false)
    }

    /// Foreign key checked when the page commits, not per statement.
    pub fn deferred_foreign_key(self, table: &str, column: &str, references: &str) -> Self {
        self.add_foreign_key(table, column, references, true)
    }

    fn add_foreign_key(self, table: &str, column: &str, references: &str, deferred: bool) -> Self {
        self.tables
            .lock()
            .unwrap()
            .get_mut(table)
            .expect("table declared before its foreign keys")
            .foreign_keys
            .push(ForeignKey {
                column: column.to_string(),
                references: references.to_string(),
                referenced_column: "id".to_string(),
                deferred,
            });
        self
    }

    /// Committed rows of a table in declared column order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.lock().unwrap();
        tables.get(table).map(|t| t.rows.clone()).unwrap_or_default()
    }

    /// Column value of every committed row.
    pub fn column(&self, table: &str, column: &str) -> Vec<SqlValue> {
        let tables = self.tables.lock().unwrap();
        let t = &tables[table];
        let i = t.position(column).expect("known column");
        t.rows.iter().map(|r| r[i].clone()).collect()
    }

    /// Tables in the order their pages were committed.
    pub fn commit_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for (table, _) in self.commits.lock().unwrap().iter() {
            if order.last() != Some(table) {
                order.push(table.clone());
            }
        }
        order
    }

    pub fn commits(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
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

        let mut tables = self.tables.lock().unwrap();
        let snapshot = tables.clone();
        let target = tables
            .get_mut(table)
            .ok_or_else(|| MigrateError::integrity(table, "relation does not exist"))?;

        // Pending rows are staged so a rejected page leaves nothing behind.
        let mut staged = target.rows.clone();
        let mut inserted = 0u64;

        for incoming in batch.rows {
            let mut row = vec![SqlValue::Null; target.columns.len()];
            for (col, value) in columns.iter().zip(incoming) {
                let i = target
                    .position(col)
                    .ok_or_else(|| MigrateError::integrity(table, format!("no column {}", col)))?;
                row[i] = value;
            }

            let collision = target.unique.iter().find(|key| {
                let k = target.key_of(&row, key);
                k.is_some() && staged.iter().any(|r| target.key_of(r, key) == k)
            });

            if let Some(key) = collision {
                let handled = conflict_keys.len() > 1 || conflict_keys.iter().any(|c| c == key);
                if handled {
                    continue;
                }
                return Err(MigrateError::integrity(
                    table,
                    format!("duplicate key value violates unique constraint on ({})", key.join(", ")),
                ));
            }

            if let Some(message) = missing_parent(&snapshot, target, &row, false) {
                return Err(MigrateError::integrity(table, message));
            }

            staged.push(row);
            inserted += 1;
        }

        for row in &staged[target.rows.len()..] {
            if let Some(message) = missing_parent(&snapshot, target, row, true) {
                return Err(MigrateError::integrity(
                    table,
                    format!("{} (checked at commit)", message),
                ));
            }
        }

        target.rows = staged;
        self.commits
            .lock()
            .unwrap()
            .push((table.to_string(), batch.page));
        Ok(inserted)
    }

    async fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        key_column: &str,
        keys: &[SqlValue],
    ) -> Result<Vec<Row>> {
        let tables = self.tables.lock().unwrap();
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let key = t
            .position(key_column)
            .ok_or_else(|| MigrateError::integrity(table, format!("no column {}", key_column)))?;
        let positions = columns
            .iter()
            .map(|c| {
                t.position(c)
                    .ok_or_else(|| MigrateError::integrity(table, format!("no column {}", c)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(t.rows
            .iter()
            .filter(|r| keys.contains(&r[key]))
            .map(|r| positions.iter().map(|&i| r[i].clone()).collect())
            .collect())
    }

    async fn referenced_tables(&self, table: &str) -> Result<Vec<String>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(table)
            .map(|t| t.foreign_keys.iter().map(|fk| fk.references.clone()).collect())
            .unwrap_or_default())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self.rows(table).len() as i64)
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
