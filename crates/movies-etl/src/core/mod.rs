//! Core abstractions for the migration engine.
//!
//! - [`schema`]: table descriptors (column mappings, uniqueness keys, roles)
//! - [`catalog`]: registry of descriptors keyed by source table
//! - [`value`]: cell values and row batches
//! - [`traits`]: source reader and target writer seams

pub mod catalog;
pub mod schema;
pub mod traits;
pub mod value;

pub use catalog::TableCatalog;
pub use schema::{ColumnMapping, TableDescriptor, TableDescriptorBuilder, TableRole};
pub use traits::{ReadOptions, SourceReader, TargetWriter};
pub use value::{Batch, Row, SqlValue};
