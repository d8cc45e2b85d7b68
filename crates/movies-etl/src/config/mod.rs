//! Configuration loading and validation.
//!
//! Settings come from the process environment (optionally seeded from a
//! `.env` file) or from a YAML file with `source`, `target` and `migration`
//! sections. Either way the result is validated before any store is touched.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable names recognized by [`Config::from_lookup`].
pub mod env {
    pub const DB_NAME: &str = "DB_NAME";
    pub const DB_USER: &str = "DB_USER";
    pub const DB_PASSWORD: &str = "DB_PASSWORD";
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_SCHEMA: &str = "DB_SCHEMA";
    pub const DB_SSLMODE: &str = "DB_SSLMODE";
    pub const SQLITE_PATH: &str = "SQLITE_PATH";
    pub const BATCH_SIZE: &str = "BATCH_SIZE";
    pub const TRANSFER_ORDER: &str = "TRANSFER_ORDER";
    pub const VALIDATION_SAMPLE_SIZE: &str = "VALIDATION_SAMPLE_SIZE";
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment.
    ///
    /// When `env_file` is given it must exist; otherwise a `.env` in the
    /// working directory is used if present. Variables already set in the
    /// environment take precedence over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    MigrateError::Config(format!("cannot read env file {:?}: {}", path, e))
                })?;
                debug!("Loaded environment from {:?}", path);
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    debug!("Loaded environment from {:?}", path);
                }
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key).ok_or_else(|| MigrateError::Config(format!("{} is not set", key)))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port_raw = required(env::DB_PORT)?;
        let port = port_raw.trim().parse::<u16>().map_err(|_| {
            MigrateError::Config(format!("{} must be a port number, got '{}'", env::DB_PORT, port_raw))
        })?;

        let mut migration = MigrationConfig::default();
        if let Some(raw) = optional(env::BATCH_SIZE) {
            migration.batch_size = raw.trim().parse::<usize>().map_err(|_| {
                MigrateError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    env::BATCH_SIZE,
                    raw
                ))
            })?;
        }
        if let Some(raw) = optional(env::TRANSFER_ORDER) {
            migration.transfer_order = TransferOrder::parse(&raw).ok_or_else(|| {
                MigrateError::Config(format!(
                    "{} must be 'static' or 'dynamic', got '{}'",
                    env::TRANSFER_ORDER,
                    raw
                ))
            })?;
        }

        if let Some(raw) = optional(env::VALIDATION_SAMPLE_SIZE) {
            migration.sample_size = raw.trim().parse::<usize>().map_err(|_| {
                MigrateError::Config(format!(
                    "{} must be a non-negative integer, got '{}'",
                    env::VALIDATION_SAMPLE_SIZE,
                    raw
                ))
            })?;
        }

        let config = Config {
            source: SourceConfig {
                sqlite_path: PathBuf::from(required(env::SQLITE_PATH)?),
            },
            target: TargetConfig {
                host: required(env::DB_HOST)?,
                port,
                database: required(env::DB_NAME)?,
                user: required(env::DB_USER)?,
                password: required(env::DB_PASSWORD)?,
                schema: optional(env::DB_SCHEMA).unwrap_or_else(|| "content".to_string()),
                ssl_mode: optional(env::DB_SSLMODE).unwrap_or_else(|| "disable".to_string()),
            },
            migration,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// Human-readable location without credentials, for logs.
    pub fn display_location(&self) -> String {
        format!(
            "{}:{}/{} (schema {})",
            self.host, self.port, self.database, self.schema
        )
    }
}
