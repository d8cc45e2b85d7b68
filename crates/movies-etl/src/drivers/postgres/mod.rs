//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax for the destination schema
//! - [`PostgresWriter`]: target writer for the destination database
//! - [`TlsBuilder`]: rustls setup driven by `ssl_mode`

mod dialect;
mod tls;
mod writer;

pub use dialect::PostgresDialect;
pub use tls::{SslMode, TlsBuilder};
pub use writer::PostgresWriter;
