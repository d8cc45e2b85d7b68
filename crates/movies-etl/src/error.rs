//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the source store cannot be read.
pub const EXIT_SOURCE_UNAVAILABLE: u8 = 2;
/// Exit code when a table mapping no longer matches the source schema.
pub const EXIT_SCHEMA_MISMATCH: u8 = 3;
/// Exit code when the destination rejects a row outside its conflict keys.
pub const EXIT_INTEGRITY_VIOLATION: u8 = 4;
/// Exit code for other destination failures.
pub const EXIT_TARGET_ERROR: u8 = 5;
/// Exit code when post-run validation finds differing row counts.
pub const EXIT_VALIDATION_FAILED: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code after SIGINT/SIGTERM.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Missing or invalid settings, or an unusable table catalog.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source store is unreachable, a table is missing, or a read failed.
    #[error("Source unavailable{}: {message}", table_suffix(.table))]
    SourceUnavailable {
        table: Option<String>,
        message: String,
    },

    /// A declared column mapping references a column the source does not have.
    #[error("Schema mismatch for table {table}: {message}")]
    SchemaMismatch { table: String, message: String },

    /// The destination rejected a row for a reason other than a declared conflict key.
    #[error("Integrity violation in table {table}: {message}")]
    IntegrityViolation { table: String, message: String },

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Row count validation failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

fn table_suffix(table: &Option<String>) -> String {
    match table {
        Some(t) => format!(" (table {})", t),
        None => String::new(),
    }
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a SourceUnavailable error not tied to a table.
    pub fn source(message: impl ToString) -> Self {
        MigrateError::SourceUnavailable {
            table: None,
            message: message.to_string(),
        }
    }

    /// Create a SourceUnavailable error for a specific table.
    pub fn source_table(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::SourceUnavailable {
            table: Some(table.into()),
            message: message.to_string(),
        }
    }

    /// Create a SchemaMismatch error
    pub fn schema_mismatch(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::SchemaMismatch {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an IntegrityViolation error
    pub fn integrity(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::IntegrityViolation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Short name of the error kind, used in the final report line.
    pub fn kind(&self) -> &'static str {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => "ConfigurationError",
            MigrateError::SourceUnavailable { .. } => "SourceUnavailable",
            MigrateError::SchemaMismatch { .. } => "SchemaMismatch",
            MigrateError::IntegrityViolation { .. } => "IntegrityViolation",
            MigrateError::Target(_) | MigrateError::Pool { .. } => "TargetError",
            MigrateError::Validation(_) => "ValidationFailed",
            MigrateError::Io(_) | MigrateError::Json(_) => "IoError",
            MigrateError::Cancelled => "Cancelled",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::SourceUnavailable { .. } => EXIT_SOURCE_UNAVAILABLE,
            MigrateError::SchemaMismatch { .. } => EXIT_SCHEMA_MISMATCH,
            MigrateError::IntegrityViolation { .. } => EXIT_INTEGRITY_VIOLATION,
            MigrateError::Target(_) | MigrateError::Pool { .. } => EXIT_TARGET_ERROR,
            MigrateError::Validation(_) => EXIT_VALIDATION_FAILED,
            MigrateError::Io(_) | MigrateError::Json(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error [{}]: {}\n", self.kind(), self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_display_includes_table() {
        let err = MigrateError::source_table("genre", "no such table: genre");
        assert_eq!(
            err.to_string(),
            "Source unavailable (table genre): no such table: genre"
        );

        let err = MigrateError::source("unable to open database file");
        assert_eq!(
            err.to_string(),
            "Source unavailable: unable to open database file"
        );
    }

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::source("x").exit_code(), EXIT_SOURCE_UNAVAILABLE);
        assert_eq!(
            MigrateError::schema_mismatch("genre", "x").exit_code(),
            EXIT_SCHEMA_MISMATCH
        );
        assert_eq!(
            MigrateError::integrity("genre_film_work", "x").exit_code(),
            EXIT_INTEGRITY_VIOLATION
        );
        assert_eq!(MigrateError::pool("x", "y").exit_code(), EXIT_TARGET_ERROR);
        assert_eq!(MigrateError::Cancelled.exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn test_format_detailed_names_kind_and_table() {
        let err = MigrateError::integrity("genre_film_work", "violates foreign key constraint");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error [IntegrityViolation]"));
        assert!(detailed.contains("genre_film_work"));
    }
}
