//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Rows per page when `BATCH_SIZE` is not set.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Rows per table compared field by field during validation.
pub const DEFAULT_SAMPLE_SIZE: usize = 2;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file.
    pub sqlite_path: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target schema (default: "content").
    #[serde(default = "default_content_schema")]
    pub schema: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per page read from the source and inserted per statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How the table load order is decided.
    #[serde(default)]
    pub transfer_order: TransferOrder,

    /// Leading source rows per table whose values `validate` compares with
    /// the destination. Zero compares counts only.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            transfer_order: TransferOrder::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Strategy used to order table transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOrder {
    /// Entity tables first, link tables second, from the declared table roles.
    #[default]
    Static,

    /// Layered order computed from the destination's foreign-key constraints.
    Dynamic,
}

impl TransferOrder {
    /// Parse a transfer order name (`static` or `dynamic`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" => Some(TransferOrder::Static),
            "dynamic" => Some(TransferOrder::Dynamic),
            _ => None,
        }
    }
}

impl fmt::Display for TransferOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOrder::Static => f.write_str("static"),
            TransferOrder::Dynamic => f.write_str("dynamic"),
        }
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_content_schema() -> String {
    "content".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}
