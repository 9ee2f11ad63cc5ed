//! Bounded-concurrency table extraction.
//!
//! Each stage fans its tables out onto tokio tasks gated by a semaphore, so
//! at most `concurrency` bulk copies are in flight at once. The stage
//! barrier is the join of the task set: a stage drains completely before the
//! planner reads its CSVs for the next one. Workers never share state —
//! every table owns its own artifact directory.

use crate::cancel::CancelToken;
use crate::engine::{ProgressEvent, ProgressSink};
use crate::error::SnapshotError;
use crate::metadata::{self, TableRecord};
use dbslice_catalog_postgres::{CopyStats, PgCatalog};
use dbslice_core::types::{TableDescriptor, TableRef};
use dbslice_observability as obs;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// One table scheduled for copy within a stage.
#[derive(Clone, Debug)]
pub struct PlannedCopy {
    /// Table identity and columns, serialized into `table.bin`
    pub descriptor: TableDescriptor,
    /// The restricted SELECT the copy streams out
    pub select_sql: String,
}

/// A completed table copy.
#[derive(Clone, Debug)]
pub struct TableCopy {
    /// The copied table
    pub table: TableRef,
    /// Rows written to `data.csv`
    pub rows: u64,
    /// Digest of the written CSV
    pub sha256: String,
}

/// Runs stages of bulk copies with bounded parallelism.
pub struct Extractor {
    catalog: Arc<PgCatalog>,
    work_dir: PathBuf,
    semaphore: Arc<Semaphore>,
    strict: bool,
    cancel: CancelToken,
    run_id: Uuid,
    progress: Option<ProgressSink>,
}

impl Extractor {
    /// Build an extractor writing below `work_dir` with `concurrency`
    /// permits.
    pub fn new(
        catalog: Arc<PgCatalog>,
        work_dir: PathBuf,
        concurrency: usize,
        strict: bool,
        cancel: CancelToken,
        run_id: Uuid,
        progress: Option<ProgressSink>,
    ) -> Self {
        Extractor {
            catalog,
            work_dir,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            strict,
            cancel,
            run_id,
            progress,
        }
    }

    /// Run every planned copy of one stage, returning the successful
    /// copies. Per-table failures are logged and skipped unless strict mode
    /// promotes them; cancellation is always fatal. Does not return until
    /// the whole stage has drained.
    pub async fn run_stage(
        &self,
        stage_index: usize,
        stage: Vec<PlannedCopy>,
    ) -> Result<Vec<TableCopy>, SnapshotError> {
        let started = Instant::now();
        let planned = stage.len();
        let mut tasks = JoinSet::new();

        for copy in stage {
            let catalog = Arc::clone(&self.catalog);
            let semaphore = Arc::clone(&self.semaphore);
            let work_dir = self.work_dir.clone();
            let cancel = self.cancel.clone();
            let run_id = self.run_id;
            let table = copy.descriptor.table.clone();
            let span = info_span!("copy_table", table = %table, stage = stage_index);

            tasks.spawn(
                async move {
                    let permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_closed) => return (table, Err(SnapshotError::Cancelled)),
                    };
                    let result =
                        extract_table(&catalog, &work_dir, &copy, &cancel, run_id).await;
                    drop(permit);
                    (table, result)
                }
                .instrument(span),
            );
        }

        let mut copies = Vec::with_capacity(planned);
        while let Some(joined) = tasks.join_next().await {
            let (table, result) = joined.map_err(|e| SnapshotError::Worker(e.to_string()))?;
            match result {
                Ok(copy) => {
                    self.emit(ProgressEvent::TableCopied {
                        table: copy.table.clone(),
                        rows: copy.rows,
                    });
                    copies.push(copy);
                }
                Err(SnapshotError::Cancelled) => {
                    self.shut_down();
                    return Err(SnapshotError::Cancelled);
                }
                Err(err) if self.strict => {
                    self.shut_down();
                    return Err(err);
                }
                Err(err) => {
                    obs::record_copy_failure(self.run_id, &table.normalized(), &err.to_string());
                    warn!(table = %table, error = %err, "table copy failed, continuing");
                    self.emit(ProgressEvent::TableFailed { table });
                }
            }
        }

        obs::record_stage_drained(self.run_id, stage_index, planned, started.elapsed());
        Ok(copies)
    }

    /// Write the header-only artifact for a table that stayed unreachable,
    /// so a restore still sees a schema-consistent layout.
    pub fn write_empty_artifact(&self, descriptor: &TableDescriptor) -> Result<(), SnapshotError> {
        write_empty_artifact(&self.work_dir, descriptor)?;
        self.emit(ProgressEvent::TableEmpty {
            table: descriptor.table.clone(),
        });
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink(event);
        }
    }

    fn shut_down(&self) {
        self.cancel.cancel();
        self.semaphore.close();
    }
}

async fn extract_table(
    catalog: &PgCatalog,
    work_dir: &Path,
    planned: &PlannedCopy,
    cancel: &CancelToken,
    run_id: Uuid,
) -> Result<TableCopy, SnapshotError> {
    let table = &planned.descriptor.table;
    let dir = work_dir.join(table.normalized());
    tokio::fs::create_dir_all(&dir).await?;
    let csv_path = dir.join("data.csv");
    let started = Instant::now();

    let mut attempt = 0;
    let stats: CopyStats = loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(SnapshotError::Cancelled);
        }

        // Recreate (truncate) the file on every attempt so a retry never
        // appends onto a partial stream.
        let file = tokio::fs::File::create(&csv_path).await?;
        let mut writer = tokio::io::BufWriter::new(file);

        let copied = tokio::select! {
            _ = cancel.cancelled() => return Err(SnapshotError::Cancelled),
            result = catalog.copy_out(table, &planned.select_sql, &mut writer) => result,
        };

        match copied {
            Ok(stats) => break stats,
            Err(err) if err.is_transient() && attempt == 1 => {
                warn!(table = %table, error = %err, "transient copy failure, retrying once");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    };

    let record = TableRecord::new(&planned.descriptor, stats.rows, stats.sha256.clone());
    metadata::write_table_record(&dir.join("table.bin"), &record)?;

    obs::record_copy_latency(run_id, &table.normalized(), stats.rows, started.elapsed());
    info!(table = %table, rows = stats.rows, "copied table");

    Ok(TableCopy {
        table: table.clone(),
        rows: stats.rows,
        sha256: stats.sha256,
    })
}

/// Header-only `data.csv` plus a zero-row `table.bin`.
pub fn write_empty_artifact(
    work_dir: &Path,
    descriptor: &TableDescriptor,
) -> Result<(), SnapshotError> {
    let dir = work_dir.join(descriptor.table.normalized());
    std::fs::create_dir_all(&dir)?;
    let csv_path = dir.join("data.csv");

    let mut writer = csv::Writer::from_path(&csv_path)?;
    writer.write_record(descriptor.column_names())?;
    writer.flush()?;
    drop(writer);

    let bytes = std::fs::read(&csv_path)?;
    let digest = hex::encode(Sha256::digest(&bytes));
    let record = TableRecord::new(descriptor, 0, digest);
    metadata::write_table_record(&dir.join("table.bin"), &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::read_table_record;
    use dbslice_core::types::{Column, SqlTypeCategory};
    use tempfile::TempDir;

    #[test]
    fn empty_artifact_has_header_and_zero_rows() {
        let dir = TempDir::new().unwrap();
        let descriptor = TableDescriptor::new(
            TableRef::parse("public.audit_log"),
            vec![
                Column::new("id", SqlTypeCategory::Integer),
                Column::new("event", SqlTypeCategory::Text),
            ],
        );

        write_empty_artifact(dir.path(), &descriptor).unwrap();

        let table_dir = dir.path().join("public.audit_log");
        let csv = std::fs::read_to_string(table_dir.join("data.csv")).unwrap();
        assert_eq!(csv, "id,event\n");

        let record = read_table_record(&table_dir.join("table.bin")).unwrap();
        assert_eq!(record.row_count, 0);
        assert_eq!(record.columns.len(), 2);
        assert!(!record.sha256.is_empty());
    }
}
