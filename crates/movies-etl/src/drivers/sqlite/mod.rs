//! SQLite driver.
//!
//! - [`SqliteDialect`]: SQL syntax for the source database
//! - [`SqliteReader`]: source reader over a read-only SQLite file

mod dialect;
mod reader;

pub use dialect::SqliteDialect;
pub use reader::SqliteReader;
