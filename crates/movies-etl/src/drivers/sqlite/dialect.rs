//! SQLite SQL dialect.

use crate::drivers::Dialect;

/// SQLite dialect: unqualified, double-quoted identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }
}
