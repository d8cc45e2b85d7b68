//! Table descriptors: the static contract between a source table and its
//! destination table.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::error::{MigrateError, Result};

/// Role a table plays in the destination schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    /// Standalone entity with no foreign keys into other migrated tables.
    Entity,

    /// Junction table linking entities through foreign keys.
    Link,
}

/// One source column copied into one destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    /// Column name in the source table.
    pub source: String,

    /// Column name in the destination table.
    pub destination: String,

    /// Whether the value is replaced by the run-wide timestamp.
    pub generated_timestamp: bool,
}

/// Immutable description of how one source table lands in the destination.
///
/// Built through [`TableDescriptor::builder`], which checks that every
/// uniqueness key only names mapped destination columns.
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    source_name: String,
    destination_name: String,
    columns: Vec<ColumnMapping>,
    ignored_source_columns: BTreeSet<String>,
    uniqueness_keys: Vec<Vec<String>>,
    role: TableRole,
    references: Vec<String>,
}

impl TableDescriptor {
    /// Start a descriptor whose source and destination share a name.
    pub fn builder(name: impl Into<String>) -> TableDescriptorBuilder {
        let name = name.into();
        TableDescriptorBuilder {
            source_name: name.clone(),
            destination_name: name,
            columns: Vec::new(),
            ignored_source_columns: BTreeSet::new(),
            uniqueness_keys: Vec::new(),
            role: TableRole::Entity,
            references: Vec::new(),
        }
    }

    /// Source table name.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Destination table name.
    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    /// Ordered column mappings.
    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// Destination columns in mapping order; this is the row layout after mapping.
    pub fn destination_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.destination.clone()).collect()
    }

    /// Source columns in mapping order.
    pub fn source_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.source.clone()).collect()
    }

    /// Source columns that are never read.
    pub fn ignored_source_columns(&self) -> &BTreeSet<String> {
        &self.ignored_source_columns
    }

    /// Check whether a source column is on the ignore list.
    pub fn is_ignored(&self, source_column: &str) -> bool {
        self.ignored_source_columns.contains(source_column)
    }

    /// Column sets that identify an already-present row.
    pub fn uniqueness_keys(&self) -> &[Vec<String>] {
        &self.uniqueness_keys
    }

    /// Declared role in the destination schema.
    pub fn role(&self) -> TableRole {
        self.role
    }

    /// Destination tables this table holds foreign keys into.
    pub fn references(&self) -> &[String] {
        &self.references
    }
}

/// Builder for [`TableDescriptor`].
#[derive(Debug, Clone)]
pub struct TableDescriptorBuilder {
    source_name: String,
    destination_name: String,
    columns: Vec<ColumnMapping>,
    ignored_source_columns: BTreeSet<String>,
    uniqueness_keys: Vec<Vec<String>>,
    role: TableRole,
    references: Vec<String>,
}

impl TableDescriptorBuilder {
    /// Use a different destination table name.
    pub fn destination(mut self, name: impl Into<String>) -> Self {
        self.destination_name = name.into();
        self
    }

    /// Map a source column onto a destination column.
    pub fn column(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.columns.push(ColumnMapping {
            source: source.into(),
            destination: destination.into(),
            generated_timestamp: false,
        });
        self
    }

    /// Map a source column onto a destination column filled with the run timestamp.
    pub fn timestamp(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.columns.push(ColumnMapping {
            source: source.into(),
            destination: destination.into(),
            generated_timestamp: true,
        });
        self
    }

    /// Never read this source column.
    pub fn ignore(mut self, source: impl Into<String>) -> Self {
        self.ignored_source_columns.insert(source.into());
        self
    }

    /// Declare a uniqueness key over destination columns.
    pub fn unique_key(mut self, columns: &[&str]) -> Self {
        self.uniqueness_keys
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Declare a foreign key into another destination table.
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references.push(table.into());
        self
    }

    /// Mark the table as a junction table.
    pub fn link(mut self) -> Self {
        self.role = TableRole::Link;
        self
    }

    /// Check invariants and build the descriptor.
    pub fn build(self) -> Result<TableDescriptor> {
        let table = &self.destination_name;
        let invalid = |msg: String| MigrateError::Config(format!("descriptor {}: {}", table, msg));

        if self.source_name.is_empty() || self.destination_name.is_empty() {
            return Err(MigrateError::Config(
                "descriptor table names must not be empty".into(),
            ));
        }
        if self.columns.is_empty() {
            return Err(invalid("no columns mapped".into()));
        }

        let mut destinations = HashSet::new();
        let mut sources = HashSet::new();
        for col in &self.columns {
            if !destinations.insert(col.destination.as_str()) {
                return Err(invalid(format!(
                    "destination column '{}' mapped twice",
                    col.destination
                )));
            }
            if !sources.insert(col.source.as_str()) {
                return Err(invalid(format!("source column '{}' mapped twice", col.source)));
            }
            if self.ignored_source_columns.contains(&col.source) {
                return Err(invalid(format!(
                    "source column '{}' is both mapped and ignored",
                    col.source
                )));
            }
        }

        if self.uniqueness_keys.is_empty() {
            return Err(invalid("at least one uniqueness key is required".into()));
        }
        for key in &self.uniqueness_keys {
            if key.is_empty() {
                return Err(invalid("empty uniqueness key".into()));
            }
            if let Some(missing) = key.iter().find(|c| !destinations.contains(c.as_str())) {
                return Err(invalid(format!(
                    "uniqueness key column '{}' is not a mapped destination column",
                    missing
                )));
            }
        }

        if self.references.iter().any(|r| r == &self.destination_name) {
            return Err(invalid("a table cannot reference itself".into()));
        }

        Ok(TableDescriptor {
            source_name: self.source_name,
            destination_name: self.destination_name,
            columns: self.columns,
            ignored_source_columns: self.ignored_source_columns,
            uniqueness_keys: self.uniqueness_keys,
            role: self.role,
            references: self.references,
        })
    }
}
