//! # movies-etl
//!
//! Idempotent migration of a movies catalog from SQLite to PostgreSQL.
//!
//! Films, genres, people and the link tables between them are copied page by
//! page into the `content` schema:
//!
//! - **Idempotent inserts**: rows already present on a declared unique key
//!   are skipped, so re-running resumes a partial migration
//! - **Dependency ordering** so referenced tables are written first
//! - **Declarative mappings** per table with renamed, ignored and
//!   timestamp-generated columns
//! - **Row-count validation** between source and destination
//!
//! ## Example
//!
//! ```rust,no_run
//! use movies_etl::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> movies_etl::Result<()> {
//!     let config = Config::from_env(None)?;
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let result = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("Inserted {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod orderer;
pub mod transfer;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig, TransferOrder};
pub use crate::core::{SqlValue, TableCatalog, TableDescriptor};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    HealthCheckResult, MigrationResult, Orchestrator, ValidationReport, ValueMismatch,
};
pub use orderer::TransferPlan;
pub use transfer::TransferStats;
