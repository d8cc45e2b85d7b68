//! Migration orchestrator - main workflow coordinator.
//!
//! A run goes through three phases:
//!
//! 1. Discovery: list source tables and keep the ones the catalog knows.
//! 2. Planning: order them so referenced tables come first, then verify
//!    every table's mapping against its source headers.
//! 3. Transfer: move each table page by page, in plan order.
//!
//! Both stores are closed when the orchestrator is done, whatever the outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, TransferOrder};
use crate::core::catalog::TableCatalog;
use crate::core::schema::TableDescriptor;
use crate::core::traits::{ReadOptions, SourceReader, TargetWriter};
use crate::core::value::SqlValue;
use crate::drivers::{PostgresWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::mapper::FieldMapper;
use crate::orderer::{self, PlanSummary, TransferPlan};
use crate::transfer::{TableTransfer, TransferStats};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    catalog: TableCatalog,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: `completed` or `dry_run`.
    pub status: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Value written into generated timestamp columns.
    pub run_timestamp: DateTime<Utc>,

    /// Tables in the order they were transferred.
    pub plan: PlanSummary,

    /// Per-table statistics.
    pub tables: Vec<TransferStats>,

    /// Total rows read from the source.
    pub rows_read: u64,

    /// Total rows newly inserted.
    pub rows_inserted: u64,

    /// Total rows skipped as already present.
    pub rows_skipped: u64,

    /// Average throughput (rows read per second).
    pub rows_per_second: i64,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Row counts of one table on both sides.
#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: String,
    pub source_rows: i64,
    pub target_rows: i64,
    pub matches: bool,
    /// Source rows whose values were compared with the destination.
    pub sampled_rows: usize,
}

/// A sampled source row that differs in the destination.
#[derive(Debug, Clone, Serialize)]
pub struct ValueMismatch {
    pub table: String,
    /// Key value identifying the row.
    pub key: String,
    /// Differing destination column, or `None` when the row is absent.
    pub column: Option<String>,
    pub source_value: Option<String>,
    pub target_value: Option<String>,
}

impl fmt::Display for ValueMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            None => write!(f, "{} row {} missing", self.table, self.key),
            Some(column) => write!(
                f,
                "{}.{} of row {} (source={}, target={})",
                self.table,
                column,
                self.key,
                self.source_value.as_deref().unwrap_or("NULL"),
                self.target_value.as_deref().unwrap_or("NULL")
            ),
        }
    }
}

/// Result of comparing source and destination.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub tables: Vec<TableCount>,
    pub value_mismatches: Vec<ValueMismatch>,
}

impl ValidationReport {
    /// Check whether every count matched and every sampled row was found intact.
    pub fn is_ok(&self) -> bool {
        self.tables.iter().all(|t| t.matches) && self.value_mismatches.is_empty()
    }

    /// Tables whose counts differ.
    pub fn mismatches(&self) -> Vec<&TableCount> {
        self.tables.iter().filter(|t| !t.matches).collect()
    }
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Open both stores described by `config`.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let catalog = TableCatalog::movies()?;

        let source = SqliteReader::connect(&config.source).await?;
        let target = match PostgresWriter::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::from_parts(
            config,
            catalog,
            Arc::new(source),
            Arc::new(target),
        ))
    }

    /// Build an orchestrator over already opened stores.
    pub fn from_parts(
        config: Config,
        catalog: TableCatalog,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            catalog,
            source,
            target,
        }
    }

    /// Table catalog in use.
    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    /// Run the migration, or only plan and verify it when `dry_run` is set.
    pub async fn run(self, cancel: CancellationToken, dry_run: bool) -> Result<MigrationResult> {
        let result = self.execute(&cancel, dry_run).await;
        if let Err(ref e) = result {
            error!("Migration failed: {}", e);
        }
        self.close().await;
        result
    }

    async fn execute(&self, cancel: &CancellationToken, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mapper = FieldMapper::new(started_at);
        let transfer = TableTransfer::new(
            self.source.as_ref(),
            self.target.as_ref(),
            mapper,
            self.config.migration.batch_size,
        );

        info!("Starting migration run: {}", run_id);

        info!(
            "Phase 1: Planning ({} order)",
            self.config.migration.transfer_order
        );
        let plan = self.plan().await?;
        let mut verified = Vec::with_capacity(plan.len());
        for planned in plan.tables() {
            verified.push(transfer.verify(&planned.descriptor).await?);
        }
        info!("Transfer order: {}", plan.table_names().join(" -> "));

        let mut tables = Vec::with_capacity(plan.len());
        if dry_run {
            info!("Dry run: {} table(s) verified, nothing written", plan.len());
        } else {
            info!("Phase 2: Transferring data");
            let timer = Instant::now();
            for (planned, verified) in plan.tables().iter().zip(verified) {
                tables.push(transfer.run(&planned.descriptor, verified, cancel).await?);
            }
            debug!("Transfer phase took {:?}", timer.elapsed());
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let rows_read: u64 = tables.iter().map(|t| t.rows_read).sum();
        let rows_inserted: u64 = tables.iter().map(|t| t.rows_inserted).sum();
        let rows_skipped: u64 = tables.iter().map(|t| t.rows_skipped).sum();
        let rows_per_second = if duration > 0.0 {
            (rows_read as f64 / duration) as i64
        } else {
            0
        };

        let result = MigrationResult {
            run_id,
            status: if dry_run { "dry_run" } else { "completed" }.to_string(),
            started_at,
            completed_at,
            duration_seconds: duration,
            run_timestamp: mapper.run_timestamp(),
            plan: plan.summary(),
            tables,
            rows_read,
            rows_inserted,
            rows_skipped,
            rows_per_second,
        };

        info!(
            "Migration {}: {} tables, {} rows read, {} inserted, {} skipped in {:.1}s",
            result.status,
            result.plan.tables.len(),
            result.rows_read,
            result.rows_inserted,
            result.rows_skipped,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Discover source tables with a registered descriptor.
    async fn discover(&self) -> Result<Vec<TableDescriptor>> {
        let found = self.source.list_tables().await?;
        let mut descriptors = Vec::new();

        for name in &found {
            match self.catalog.get(name) {
                Some(desc) => descriptors.push(desc.clone()),
                None => debug!("Skipping unregistered source table {}", name),
            }
        }

        for desc in self.catalog.descriptors() {
            if !found.iter().any(|n| n == desc.source_name()) {
                warn!("Registered table {} not found in source", desc.source_name());
            }
        }

        info!(
            "Found {} source table(s), {} to migrate",
            found.len(),
            descriptors.len()
        );
        Ok(descriptors)
    }

    /// Build and validate the transfer plan.
    pub async fn plan(&self) -> Result<TransferPlan> {
        let descriptors = self.discover().await?;
        let plan = match self.config.migration.transfer_order {
            TransferOrder::Static => orderer::plan_static(descriptors),
            TransferOrder::Dynamic => {
                orderer::plan_dynamic(descriptors, self.target.as_ref()).await?
            }
        };
        orderer::validate_plan(&plan)?;
        Ok(plan)
    }

    /// Compare every registered table present in the source with the
    /// destination: row counts, then the values of the first `sample_size`
    /// source rows looked up by key. Generated timestamps are not compared.
    ///
    /// Fails with `Validation` when anything differs.
    pub async fn validate(self) -> Result<ValidationReport> {
        let result = self.compare_tables().await;
        self.close().await;
        let report = result?;

        if !report.is_ok() {
            let mut problems: Vec<String> = report
                .mismatches()
                .iter()
                .map(|t| format!("{} (source={}, target={})", t.table, t.source_rows, t.target_rows))
                .collect();
            problems.extend(report.value_mismatches.iter().map(ToString::to_string));
            return Err(MigrateError::Validation(format!(
                "destination differs from source: {}",
                problems.join(", ")
            )));
        }
        Ok(report)
    }

    async fn compare_tables(&self) -> Result<ValidationReport> {
        let mut tables = Vec::new();
        let mut value_mismatches = Vec::new();

        for desc in self.discover().await? {
            let source_rows = self.source.row_count(desc.source_name()).await?;
            let target_rows = self.target.row_count(desc.destination_name()).await?;
            let matches = source_rows == target_rows;

            if matches {
                info!("{}: {} rows (match)", desc.destination_name(), source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    desc.destination_name(),
                    source_rows,
                    target_rows
                );
            }

            let (sampled_rows, differences) = self.sample_values(&desc).await?;
            for diff in &differences {
                warn!("Value mismatch: {}", diff);
            }
            value_mismatches.extend(differences);

            tables.push(TableCount {
                table: desc.destination_name().to_string(),
                source_rows,
                target_rows,
                matches,
                sampled_rows,
            });
        }

        Ok(ValidationReport {
            tables,
            value_mismatches,
        })
    }

    /// Compare the leading source rows of a table with the destination rows
    /// sharing their key. Returns the number of rows compared and the
    /// differences found.
    async fn sample_values(&self, desc: &TableDescriptor) -> Result<(usize, Vec<ValueMismatch>)> {
        let sample_size = self.config.migration.sample_size;
        let columns: Vec<_> = desc
            .columns()
            .iter()
            .filter(|c| !c.generated_timestamp)
            .collect();
        let key_pos = desc
            .uniqueness_keys()
            .iter()
            .find_map(|key| match key.as_slice() {
                [column] => columns.iter().position(|c| &c.destination == column),
                _ => None,
            });

        let Some(key_pos) = key_pos.filter(|_| sample_size > 0) else {
            debug!("{}: values not sampled", desc.destination_name());
            return Ok((0, Vec::new()));
        };

        let source_columns: Vec<String> = columns.iter().map(|c| c.source.clone()).collect();
        let target_columns: Vec<String> = columns.iter().map(|c| c.destination.clone()).collect();
        let key_column = &target_columns[key_pos];

        let mut rx = self.source.read_rows(ReadOptions::new(
            desc.source_name(),
            source_columns,
            sample_size,
        ));
        let sample = match rx.recv().await {
            Some(batch) => batch?.rows,
            None => Vec::new(),
        };
        drop(rx);

        let keys: Vec<SqlValue> = sample.iter().map(|row| row[key_pos].clone()).collect();
        let stored = self
            .target
            .fetch_rows(desc.destination_name(), &target_columns, key_column, &keys)
            .await?;

        let mut differences = Vec::new();
        for row in &sample {
            let key = row[key_pos].to_text().unwrap_or_else(|| "NULL".to_string());
            let Some(found) = stored.iter().find(|s| row[key_pos].same_data(&s[key_pos])) else {
                differences.push(ValueMismatch {
                    table: desc.destination_name().to_string(),
                    key,
                    column: None,
                    source_value: None,
                    target_value: None,
                });
                continue;
            };

            for (i, column) in target_columns.iter().enumerate() {
                if !row[i].same_data(&found[i]) {
                    differences.push(ValueMismatch {
                        table: desc.destination_name().to_string(),
                        key: key.clone(),
                        column: Some(column.clone()),
                        source_value: row[i].to_text(),
                        target_value: found[i].to_text(),
                    });
                }
            }
        }

        Ok((sample.len(), differences))
    }

    /// Check that both stores answer queries.
    pub async fn health_check(self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.test_connection().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.test_connection().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        self.close().await;

        Ok(HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            target_connected: target.is_ok(),
            target_latency_ms,
            healthy: source.is_ok() && target.is_ok(),
            source_error: source.err().map(|e| e.to_string()),
            target_error: target.err().map(|e| e.to_string()),
        })
    }

    async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
        debug!(
            "Closed {} source and {} target",
            self.source.db_type(),
            self.target.db_type()
        );
    }
}
