//! Table transfer routine: page through one source table, map each page and
//! write it to the destination.
//!
//! The routine is sequential. The reader runs one page ahead through a
//! bounded channel; each page is mapped and committed before the next one is
//! taken off the channel. Cancellation is checked between pages.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::schema::TableDescriptor;
use crate::core::traits::{ReadOptions, SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::mapper::{FieldMapper, RowProjection};

/// Statistics for one transferred table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    /// Destination table name.
    pub table: String,

    /// Rows read from the source.
    pub rows_read: u64,

    /// Rows newly inserted into the destination.
    pub rows_inserted: u64,

    /// Rows skipped because they were already present.
    pub rows_skipped: u64,

    /// Pages committed.
    pub pages: usize,

    /// Time spent waiting on the source.
    #[serde(skip)]
    pub read_time: Duration,

    /// Time spent writing.
    #[serde(skip)]
    pub write_time: Duration,
}

/// Source columns to read and how they map onto the destination.
#[derive(Debug, Clone)]
pub struct VerifiedTable {
    /// Source headers with ignored columns removed.
    pub read_columns: Vec<String>,
    /// Projection of the read columns onto destination columns.
    pub projection: RowProjection,
}

/// Transfers tables between one source and one destination.
pub struct TableTransfer<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    mapper: FieldMapper,
    batch_size: usize,
}

impl<'a> TableTransfer<'a> {
    pub fn new(
        source: &'a dyn SourceReader,
        target: &'a dyn TargetWriter,
        mapper: FieldMapper,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            target,
            mapper,
            batch_size,
        }
    }

    /// Read the table's headers, drop ignored columns and check the mapping.
    pub async fn verify(&self, descriptor: &TableDescriptor) -> Result<VerifiedTable> {
        let headers = self.source.headers(descriptor.source_name()).await?;
        let read_columns: Vec<String> = headers
            .into_iter()
            .filter(|h| !descriptor.is_ignored(h))
            .collect();

        let projection = self.mapper.projection(descriptor, &read_columns)?;
        if !projection.unmapped_headers().is_empty() {
            warn!(
                "{}: dropping unmapped source column(s): {}",
                descriptor.source_name(),
                projection.unmapped_headers().join(", ")
            );
        }

        Ok(VerifiedTable {
            read_columns,
            projection,
        })
    }

    /// Transfer every row of one table verified by [`verify`](Self::verify).
    pub async fn run(
        &self,
        descriptor: &TableDescriptor,
        verified: VerifiedTable,
        cancel: &CancellationToken,
    ) -> Result<TransferStats> {
        let table = descriptor.destination_name();
        let columns = descriptor.destination_columns();

        let mut stats = TransferStats {
            table: table.to_string(),
            ..Default::default()
        };

        info!("{}: transferring from {}", table, descriptor.source_name());

        let mut rx = self.source.read_rows(ReadOptions::new(
            descriptor.source_name(),
            verified.read_columns,
            self.batch_size,
        ));

        loop {
            if cancel.is_cancelled() {
                warn!("{}: cancelled after {} page(s)", table, stats.pages);
                return Err(MigrateError::Cancelled);
            }

            let read_start = Instant::now();
            let batch = match rx.recv().await {
                Some(batch) => batch?,
                None => break,
            };
            stats.read_time += read_start.elapsed();

            let read = batch.len() as u64;
            let page = batch.page;
            let mapped = self.mapper.map_batch(&verified.projection, batch)?;

            let write_start = Instant::now();
            let inserted = self
                .target
                .insert_batch(table, &columns, mapped, descriptor.uniqueness_keys())
                .await?;
            stats.write_time += write_start.elapsed();

            stats.rows_read += read;
            stats.rows_inserted += inserted;
            stats.rows_skipped += read.saturating_sub(inserted);
            stats.pages += 1;

            debug!(
                "{}: page {} committed ({} read, {} inserted)",
                table, page, read, inserted
            );
        }

        info!(
            "{}: {} rows read, {} inserted, {} skipped in {} page(s)",
            table, stats.rows_read, stats.rows_inserted, stats.rows_skipped, stats.pages
        );

        Ok(stats)
    }
}
