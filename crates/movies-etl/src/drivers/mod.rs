//! Database driver implementations.
//!
//! - [`sqlite`]: SQLite source reader
//! - [`postgres`]: PostgreSQL target writer and TLS setup
//!
//! Each driver pairs a [`Dialect`] (SQL text generation) with the
//! [`SourceReader`](crate::core::SourceReader) or
//! [`TargetWriter`](crate::core::TargetWriter) it implements. Statements are
//! built by the dialect and executed by the driver so the SQL stays testable
//! without a live database.

pub mod postgres;
pub mod sqlite;

pub use postgres::{PostgresDialect, PostgresWriter, SslMode, TlsBuilder};
pub use sqlite::{SqliteDialect, SqliteReader};

/// SQL syntax strategy for a database engine.
pub trait Dialect: Send + Sync {
    /// Engine name used in logs.
    fn name(&self) -> &str;

    /// Quote an identifier, doubling embedded quotes.
    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Fully qualified table reference.
    fn qualify_table(&self, table: &str) -> String {
        self.quote_ident(table)
    }

    /// `SELECT cols FROM table`, or `SELECT *` when `columns` is empty.
    fn build_select_query(&self, table: &str, columns: &[String]) -> String {
        let cols = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("SELECT {} FROM {}", cols, self.qualify_table(table))
    }

    /// `SELECT COUNT(*) FROM table`.
    fn build_count_query(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.qualify_table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialects_share_select_shape() {
        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            SqliteDialect.build_select_query("genre", &cols),
            "SELECT \"id\", \"name\" FROM \"genre\""
        );
        assert_eq!(
            PostgresDialect::new("content").build_select_query("genre", &cols),
            "SELECT \"id\", \"name\" FROM \"content\".\"genre\""
        );
    }

    #[test]
    fn test_select_star_without_columns() {
        assert_eq!(
            SqliteDialect.build_select_query("person", &[]),
            "SELECT * FROM \"person\""
        );
    }
}
