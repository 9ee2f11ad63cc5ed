//! Drives one snapshot run end to end: seed sampling, layered stages,
//! fixed-point closure over cyclic remainders, and header-only artifacts
//! for whatever stayed unreachable.

use crate::cancel::CancelToken;
use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::extractor::{Extractor, PlannedCopy, TableCopy};
use crate::plan::ExecutionPlan;
use crate::predicate::{seed_select, PredicateBuilder};
use dbslice_catalog_postgres::PgCatalog;
use dbslice_core::graph::RelationGraph;
use dbslice_core::types::{TableDescriptor, TableRef};
use dbslice_observability as obs;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Progress notifications surfaced to the driver.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// The plan is known; one artifact per table will be produced.
    Planned {
        /// Total artifacts the run will write
        total_tables: usize,
    },
    /// One table's rows were copied.
    TableCopied {
        /// The copied table
        table: TableRef,
        /// Rows written
        rows: u64,
    },
    /// One table's copy failed (non-strict mode keeps going).
    TableFailed {
        /// The failed table
        table: TableRef,
    },
    /// One unreachable table got a header-only artifact.
    TableEmpty {
        /// The unreachable table
        table: TableRef,
    },
}

/// Callback the driver registers to observe progress.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// What a finished run produced.
#[derive(Clone, Debug)]
pub struct SnapshotReport {
    /// Identity of this run
    pub run_id: Uuid,
    /// Successfully copied tables
    pub copied: Vec<TableCopy>,
    /// Tables that stayed unreachable under the seed
    pub unreachable: Vec<TableRef>,
}

impl SnapshotReport {
    /// Sum of rows across all copied tables.
    pub fn total_rows(&self) -> u64 {
        self.copied.iter().map(|c| c.rows).sum()
    }
}

/// Orchestrates plan execution against one catalog.
pub struct SnapshotEngine {
    catalog: Arc<PgCatalog>,
    config: SnapshotConfig,
    cancel: CancelToken,
    run_id: Uuid,
    progress: Option<ProgressSink>,
}

impl SnapshotEngine {
    /// Engine for one run. Each engine carries a fresh run id.
    pub fn new(catalog: Arc<PgCatalog>, config: SnapshotConfig) -> Self {
        SnapshotEngine {
            catalog,
            config,
            cancel: CancelToken::new(),
            run_id: Uuid::new_v4(),
            progress: None,
        }
    }

    /// Attach a progress sink.
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Token the driver can trip to abort extraction.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// This run's identity.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Execute the run. `descriptors` is the full (skip-filtered) table
    /// listing; `graph` the foreign-key graph over the same catalog.
    pub async fn run(
        &self,
        descriptors: &[TableDescriptor],
        graph: &RelationGraph,
    ) -> Result<SnapshotReport, SnapshotError> {
        self.config.validate()?;

        let by_name: BTreeMap<String, &TableDescriptor> = descriptors
            .iter()
            .map(|d| (d.table.normalized(), d))
            .collect();
        let seed = &self.config.seed;
        let Some(seed_descriptor) = by_name.get(&seed.normalized()) else {
            return Err(SnapshotError::SeedMissing(seed.normalized()));
        };

        std::fs::create_dir_all(&self.config.work_dir)?;
        self.emit(ProgressEvent::Planned {
            total_tables: descriptors.len(),
        });

        let plan = ExecutionPlan::build(graph, seed);
        info!(
            stages = plan.stages.len(),
            tables = plan.table_count(),
            seed = %seed,
            "execution plan ready"
        );

        let extractor = Extractor::new(
            Arc::clone(&self.catalog),
            self.config.work_dir.clone(),
            self.config.concurrency,
            self.config.strict,
            self.cancel.clone(),
            self.run_id,
            self.progress.clone(),
        );
        let predicates =
            PredicateBuilder::new(graph, &self.config.work_dir, self.config.strict);

        let mut extracted: BTreeSet<String> = BTreeSet::new();
        let mut copied: Vec<TableCopy> = Vec::new();

        // Stage 0: sample the seed.
        let estimate = self.catalog.estimate_row_count(seed).await?;
        let stage0 = vec![PlannedCopy {
            descriptor: (*seed_descriptor).clone(),
            select_sql: seed_select(seed, estimate, self.config.sample_fraction),
        }];
        absorb(
            extractor.run_stage(0, stage0).await?,
            &mut extracted,
            &mut copied,
        );

        // Layered stages; members of a layer run concurrently, layers are
        // strictly sequenced because each reads the previous one's CSVs.
        let mut stage_index = 1;
        for layer in plan.stages.iter().skip(1) {
            let planned = self.plan_stage(&layer.tables, &by_name, &predicates, &extracted)?;
            if planned.is_empty() {
                continue;
            }
            absorb(
                extractor.run_stage(stage_index, planned).await?,
                &mut extracted,
                &mut copied,
            );
            stage_index += 1;
        }

        // Fixed point: re-visit the traversal order until a full pass adds
        // no new table. Cyclic components converge here.
        loop {
            let pending: Vec<TableRef> = plan
                .traversal
                .iter()
                .filter(|t| {
                    let key = t.normalized();
                    !extracted.contains(&key) && by_name.contains_key(&key)
                })
                .cloned()
                .collect();
            if pending.is_empty() {
                break;
            }
            obs::set_tables_remaining(self.run_id, pending.len() as u64);

            let planned = self.plan_stage(&pending, &by_name, &predicates, &extracted)?;
            if planned.is_empty() {
                break;
            }
            let outcome = extractor.run_stage(stage_index, planned).await?;
            stage_index += 1;
            if outcome.is_empty() {
                break;
            }
            absorb(outcome, &mut extracted, &mut copied);
        }

        // Whatever is still missing gets a header-only artifact so the
        // archive stays schema-consistent for restore.
        let mut unreachable = Vec::new();
        for descriptor in descriptors {
            if extracted.contains(&descriptor.table.normalized()) {
                continue;
            }
            warn!(
                table = %descriptor.table,
                "table unreachable under seed, writing header-only artifact"
            );
            extractor.write_empty_artifact(descriptor)?;
            unreachable.push(descriptor.table.clone());
        }

        Ok(SnapshotReport {
            run_id: self.run_id,
            copied,
            unreachable,
        })
    }

    fn plan_stage(
        &self,
        tables: &[TableRef],
        by_name: &BTreeMap<String, &TableDescriptor>,
        predicates: &PredicateBuilder<'_>,
        extracted: &BTreeSet<String>,
    ) -> Result<Vec<PlannedCopy>, SnapshotError> {
        let mut planned = Vec::new();
        for table in tables {
            let key = table.normalized();
            if extracted.contains(&key) {
                continue;
            }
            // A graph vertex without a descriptor was excluded by the skip
            // set; its edges contribute nothing.
            let Some(descriptor) = by_name.get(&key) else {
                continue;
            };
            if let Some(select_sql) = predicates.build_select(table, extracted)? {
                planned.push(PlannedCopy {
                    descriptor: (*descriptor).clone(),
                    select_sql,
                });
            }
        }
        Ok(planned)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink(event);
        }
    }
}

fn absorb(outcome: Vec<TableCopy>, extracted: &mut BTreeSet<String>, copied: &mut Vec<TableCopy>) {
    for copy in outcome {
        extracted.insert(copy.table.normalized());
        copied.push(copy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_sums_rows() {
        let report = SnapshotReport {
            run_id: Uuid::new_v4(),
            copied: vec![
                TableCopy {
                    table: TableRef::parse("public.a"),
                    rows: 10,
                    sha256: "aa".into(),
                },
                TableCopy {
                    table: TableRef::parse("public.b"),
                    rows: 5,
                    sha256: "bb".into(),
                },
            ],
            unreachable: vec![],
        };
        assert_eq!(report.total_rows(), 15);
    }
}
