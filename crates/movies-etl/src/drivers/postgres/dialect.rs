//! PostgreSQL SQL dialect.
//!
//! Generates schema-qualified statements for the destination, most notably
//! the multi-row insert that skips rows already present.

use crate::core::value::{Row, SqlValue};
use crate::drivers::Dialect;

/// PostgreSQL dialect bound to one destination schema.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    schema: String,
}

impl PostgresDialect {
    /// Create a dialect that qualifies tables with `schema`.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// The destination schema.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Build `INSERT ... VALUES (...), (...) ON CONFLICT ... DO NOTHING`.
    ///
    /// With exactly one conflict key the clause targets that key's columns;
    /// with several it is left untargeted so a collision on any unique
    /// constraint skips the row. Values are rendered as literals so the
    /// server coerces text into uuid and date columns.
    pub fn build_insert_ignore(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
        conflict_keys: &[Vec<String>],
    ) -> String {
        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let values = rows
            .iter()
            .map(|row| {
                let literals = row
                    .iter()
                    .map(|v| v.to_sql_literal())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", literals)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let conflict = match conflict_keys {
            [key] => format!(
                "ON CONFLICT ({}) DO NOTHING",
                key.iter()
                    .map(|c| self.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            _ => "ON CONFLICT DO NOTHING".to_string(),
        };

        format!(
            "INSERT INTO {} ({}) VALUES {} {}",
            self.qualify_table(table),
            col_list,
            values,
            conflict
        )
    }

    /// Select `columns` cast to text for the rows whose `key_column` is one
    /// of `keys`. The key literals are coerced to the key column's type.
    pub fn build_fetch_by_key(
        &self,
        table: &str,
        columns: &[String],
        key_column: &str,
        keys: &[SqlValue],
    ) -> String {
        let cols = columns
            .iter()
            .map(|c| format!("{}::text", self.quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let keys = keys
            .iter()
            .map(SqlValue::to_sql_literal)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            cols,
            self.qualify_table(table),
            self.quote_ident(key_column),
            keys
        )
    }

    /// Tables a table holds foreign keys into. Binds `$1` schema, `$2` table.
    pub fn referenced_tables_query(&self) -> &'static str {
        r#"
        SELECT DISTINCT rt.relname
        FROM pg_constraint c
        JOIN pg_class t ON t.oid = c.conrelid
        JOIN pg_namespace tn ON tn.oid = t.relnamespace
        JOIN pg_class rt ON rt.oid = c.confrelid
        WHERE c.contype = 'f'
          AND tn.nspname = $1
          AND t.relname = $2
        ORDER BY rt.relname
        "#
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn qualify_table(&self, table: &str) -> String {
        format!("{}.{}", self.quote_ident(&self.schema), self.quote_ident(table))
    }
}
