//! Field mapper: reshapes source rows into destination column order.
//!
//! Mapping is a pure projection. The only state is the run timestamp,
//! captured once when the mapper is created, which replaces every column
//! flagged as a generated timestamp so all rows of one run share a single
//! creation instant.

use chrono::{DateTime, Utc};

use crate::core::schema::TableDescriptor;
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Where a destination column's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Position in the source row.
    Source(usize),
    /// The run timestamp.
    RunTimestamp,
}

/// Precomputed header positions for one table.
#[derive(Debug, Clone)]
pub struct RowProjection {
    table: String,
    slots: Vec<Slot>,
    header_count: usize,
    unmapped: Vec<String>,
}

impl RowProjection {
    /// Source headers that are neither mapped nor ignored.
    pub fn unmapped_headers(&self) -> &[String] {
        &self.unmapped
    }
}

/// Maps raw source pages onto destination rows.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper {
    run_timestamp: DateTime<Utc>,
}

impl FieldMapper {
    /// Create a mapper stamping rows with `run_timestamp`.
    pub fn new(run_timestamp: DateTime<Utc>) -> Self {
        Self { run_timestamp }
    }

    /// The timestamp written into generated timestamp columns.
    pub fn run_timestamp(&self) -> DateTime<Utc> {
        self.run_timestamp
    }

    /// Resolve each mapped column against the headers the source returned.
    ///
    /// Fails with `SchemaMismatch` if a mapped source column is missing.
    pub fn projection(
        &self,
        descriptor: &TableDescriptor,
        headers: &[String],
    ) -> Result<RowProjection> {
        let mut missing = Vec::new();
        let mut slots = Vec::with_capacity(descriptor.columns().len());

        for col in descriptor.columns() {
            match headers.iter().position(|h| h == &col.source) {
                Some(_) if col.generated_timestamp => slots.push(Slot::RunTimestamp),
                Some(idx) => slots.push(Slot::Source(idx)),
                None => missing.push(col.source.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(MigrateError::schema_mismatch(
                descriptor.source_name(),
                format!(
                    "mapped source column(s) {} not found in source headers [{}]",
                    missing.join(", "),
                    headers.join(", ")
                ),
            ));
        }

        let unmapped = headers
            .iter()
            .filter(|h| !descriptor.is_ignored(h) && !descriptor.columns().iter().any(|c| &c.source == *h))
            .cloned()
            .collect();

        Ok(RowProjection {
            table: descriptor.source_name().to_string(),
            slots,
            header_count: headers.len(),
            unmapped,
        })
    }

    /// Map one page through a projection.
    pub fn map_batch(&self, projection: &RowProjection, batch: Batch) -> Result<Batch> {
        let page = batch.page;
        let rows = batch
            .rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| self.map_row(projection, row, page, i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Batch::new(rows).with_page(page))
    }

    /// Map one page of a table read with `headers`.
    pub fn map_page(
        &self,
        descriptor: &TableDescriptor,
        headers: &[String],
        batch: Batch,
    ) -> Result<Batch> {
        let projection = self.projection(descriptor, headers)?;
        self.map_batch(&projection, batch)
    }

    fn map_row(&self, projection: &RowProjection, mut row: Row, page: usize, idx: usize) -> Result<Row> {
        if row.len() != projection.header_count {
            return Err(MigrateError::schema_mismatch(
                &projection.table,
                format!(
                    "row {} of page {} has {} values, expected {}",
                    idx,
                    page,
                    row.len(),
                    projection.header_count
                ),
            ));
        }

        Ok(projection
            .slots
            .iter()
            .map(|slot| match *slot {
                Slot::Source(pos) => std::mem::replace(&mut row[pos], SqlValue::Null),
                Slot::RunTimestamp => SqlValue::Timestamp(self.run_timestamp),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn film_work() -> TableDescriptor {
        TableDescriptor::builder("film_work")
            .column("id", "id")
            .column("title", "title")
            .column("rating", "rating")
            .timestamp("created_at", "created")
            .timestamp("updated_at", "modified")
            .ignore("file_path")
            .unique_key(&["id"])
            .build()
            .unwrap()
    }

    fn mapper() -> FieldMapper {
        FieldMapper::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn test_maps_into_destination_order_with_run_timestamp() {
        let source_headers = headers(&["title", "file_path", "id", "created_at", "rating", "updated_at"]);
        let batch = Batch::new(vec![vec![
            SqlValue::from("Some Movie"),
            SqlValue::from("/films/1.mp4"),
            SqlValue::from("f1"),
            SqlValue::from("2021-06-16 20:14:09.221838+00"),
            SqlValue::F64(85.0),
            SqlValue::Null,
        ]]);

        let mapped = mapper().map_page(&film_work(), &source_headers, batch).unwrap();
        let ts = SqlValue::Timestamp(mapper().run_timestamp());
        assert_eq!(
            mapped.rows[0],
            vec![
                SqlValue::from("f1"),
                SqlValue::from("Some Movie"),
                SqlValue::F64(85.0),
                ts.clone(),
                ts,
            ]
        );
    }

    #[test]
    fn test_every_row_shares_one_timestamp() {
        let source_headers = headers(&["id", "title", "rating", "created_at", "updated_at"]);
        let row = |id: &str| {
            vec![
                SqlValue::from(id),
                SqlValue::from("t"),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
            ]
        };
        let m = mapper();
        let first = m
            .map_page(&film_work(), &source_headers, Batch::new(vec![row("a")]))
            .unwrap();
        let second = m
            .map_page(&film_work(), &source_headers, Batch::new(vec![row("b")]).with_page(1))
            .unwrap();
        assert_eq!(first.rows[0][3], second.rows[0][3]);
        assert_eq!(second.page, 1);
    }

    #[test]
    fn test_missing_mapped_header_is_schema_mismatch() {
        let source_headers = headers(&["id", "title", "created_at", "updated_at"]);
        let err = mapper()
            .map_page(&film_work(), &source_headers, Batch::default())
            .unwrap_err();
        match err {
            MigrateError::SchemaMismatch { table, message } => {
                assert_eq!(table, "film_work");
                assert!(message.contains("rating"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_row_is_schema_mismatch() {
        let source_headers = headers(&["id", "title", "rating", "created_at", "updated_at"]);
        let batch = Batch::new(vec![vec![SqlValue::from("f1")]]);
        assert!(matches!(
            mapper().map_page(&film_work(), &source_headers, batch),
            Err(MigrateError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_unmapped_headers_are_reported() {
        let source_headers = headers(&["id", "title", "rating", "created_at", "updated_at", "file_path", "certificate"]);
        let projection = mapper().projection(&film_work(), &source_headers).unwrap();
        assert_eq!(projection.unmapped_headers(), ["certificate"]);
        assert_eq!(projection.slots.len(), 5);
    }

    #[test]
    fn test_descriptor_is_untouched() {
        let desc = film_work();
        let before = desc.destination_columns();
        let source_headers = headers(&["id", "title", "rating", "created_at", "updated_at"]);
        let _ = mapper().map_page(&desc, &source_headers, Batch::default()).unwrap();
        assert_eq!(desc.destination_columns(), before);
    }
}
