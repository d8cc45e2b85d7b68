//! Table catalog: the registry of tables the engine knows how to migrate.
//!
//! Dispatch is data-driven: the orchestrator looks a discovered source table
//! up here and runs the same transfer routine with whatever descriptor it
//! finds. Tables without an entry are skipped.

use std::collections::HashMap;

use crate::error::{MigrateError, Result};

use super::schema::TableDescriptor;

/// Registry of table descriptors keyed by source table name.
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    descriptors: Vec<TableDescriptor>,
    by_source: HashMap<String, usize>,
}

impl TableCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Fails when the source or destination name is already registered.
    pub fn register(&mut self, descriptor: TableDescriptor) -> Result<()> {
        if self.by_source.contains_key(descriptor.source_name()) {
            return Err(MigrateError::Config(format!(
                "table '{}' is registered twice",
                descriptor.source_name()
            )));
        }
        if self
            .descriptors
            .iter()
            .any(|d| d.destination_name() == descriptor.destination_name())
        {
            return Err(MigrateError::Config(format!(
                "destination table '{}' is registered twice",
                descriptor.destination_name()
            )));
        }

        self.by_source
            .insert(descriptor.source_name().to_string(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, descriptor: TableDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Look up the descriptor for a source table.
    pub fn get(&self, source_name: &str) -> Option<&TableDescriptor> {
        self.by_source.get(source_name).map(|&i| &self.descriptors[i])
    }

    /// Look up a descriptor by destination table name.
    pub fn by_destination(&self, destination_name: &str) -> Option<&TableDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.destination_name() == destination_name)
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> &[TableDescriptor] {
        &self.descriptors
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check that every declared reference names a registered destination table.
    pub fn validate(&self) -> Result<()> {
        for desc in &self.descriptors {
            for target in desc.references() {
                if self.by_destination(target).is_none() {
                    return Err(MigrateError::Config(format!(
                        "descriptor {} references unregistered table '{}'",
                        desc.destination_name(),
                        target
                    )));
                }
            }
        }
        Ok(())
    }

    /// The movies catalog: genres, people, film works and their link tables.
    ///
    /// Source `created_at`/`updated_at` columns land in the destination's
    /// timestamp columns and are overwritten with the run timestamp.
    pub fn movies() -> Result<Self> {
        let catalog = Self::new()
            .with(
                TableDescriptor::builder("genre")
                    .column("id", "id")
                    .column("name", "name")
                    .column("description", "description")
                    .timestamp("created_at", "created")
                    .timestamp("updated_at", "modified")
                    .unique_key(&["id"])
                    .build()?,
            )?
            .with(
                TableDescriptor::builder("person")
                    .column("id", "id")
                    .column("full_name", "full_name")
                    .timestamp("created_at", "created")
                    .timestamp("updated_at", "modified")
                    .unique_key(&["id"])
                    .build()?,
            )?
            .with(
                TableDescriptor::builder("film_work")
                    .column("id", "id")
                    .column("title", "title")
                    .column("description", "description")
                    .column("creation_date", "creation_date")
                    .column("rating", "rating")
                    .column("type", "type")
                    .timestamp("created_at", "created")
                    .timestamp("updated_at", "modified")
                    .ignore("file_path")
                    .ignore("certificate")
                    .unique_key(&["id"])
                    .build()?,
            )?
            .with(
                TableDescriptor::builder("genre_film_work")
                    .column("id", "id")
                    .column("film_work_id", "film_work_id")
                    .column("genre_id", "genre_id")
                    .timestamp("created_at", "created_at")
                    .unique_key(&["id"])
                    .unique_key(&["film_work_id", "genre_id"])
                    .references("film_work")
                    .references("genre")
                    .link()
                    .build()?,
            )?
            .with(
                TableDescriptor::builder("person_film_work")
                    .column("id", "id")
                    .column("film_work_id", "film_work_id")
                    .column("person_id", "person_id")
                    .column("role", "role")
                    .timestamp("created_at", "created_at")
                    .unique_key(&["id"])
                    .unique_key(&["film_work_id", "person_id", "role"])
                    .references("film_work")
                    .references("person")
                    .link()
                    .build()?,
            )?;

        catalog.validate()?;
        Ok(catalog)
    }
}
