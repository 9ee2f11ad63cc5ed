//! Driver wiring for the `dbslice` binary: sequences catalog introspection,
//! plan execution, DDL splitting, and packaging.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use dbslice_catalog_postgres::{ConnectionParams, PgCatalog};
use dbslice_core::graph::RelationGraph;
use dbslice_core::TableRef;
use dbslice_snapshot::archive::package_dir;
use dbslice_snapshot::ddl::split_schema_dump;
use dbslice_snapshot::manifest::{self, Manifest, ManifestTable};
use dbslice_snapshot::{
    ProgressEvent, ProgressSink, SchemaDumpTool, SnapshotConfig, SnapshotEngine, SnapshotError,
};

/// Fully resolved configuration for one invocation.
pub struct RunConfig {
    /// How to reach the database
    pub params: ConnectionParams,
    /// Seed table to sample
    pub seed: TableRef,
    /// Fraction of the seed to sample
    pub sample_fraction: f64,
    /// Concurrent bulk-copy limit
    pub concurrency: usize,
    /// Promote per-table failures to process failure
    pub strict: bool,
    /// Normalized names of tables to leave out
    pub skip_tables: BTreeSet<String>,
    /// Working directory for artifacts before packaging
    pub work_dir: PathBuf,
    /// Print the FK graph as DOT before extraction
    pub print_graph: bool,
}

/// Result of a successful run.
pub struct RunSummary {
    /// Path of the written archive
    pub archive: PathBuf,
    /// Tables with extracted rows
    pub tables_copied: usize,
    /// Total rows copied across all tables
    pub rows_copied: u64,
    /// Tables unreachable under the seed
    pub unreachable: usize,
}

/// Executes the snapshot workflow end to end. The working directory never
/// outlives a failed run.
pub async fn run_snapshot(config: RunConfig) -> Result<RunSummary> {
    let result = execute(&config).await;
    if result.is_err() && config.work_dir.exists() {
        if let Err(err) = std::fs::remove_dir_all(&config.work_dir) {
            warn!(error = %err, "failed to clean up working directory");
        }
    }
    result
}

async fn execute(config: &RunConfig) -> Result<RunSummary> {
    let pool_size = config.concurrency as u32 + 1;
    let catalog = Arc::new(
        PgCatalog::connect(&config.params, pool_size)
            .await
            .context("failed to connect to database")?,
    );

    // Refuse to start when the dump tool cannot speak the server's major
    // version; nothing has been extracted yet at this point.
    let server = catalog.server_version().await?;
    let dump_tool = SchemaDumpTool::new();
    let tool = dump_tool.version().await?;
    info!(%server, %tool, "server and dump tool versions");
    if !server.same_major(&tool) {
        return Err(SnapshotError::VersionMismatch { server, tool }.into());
    }

    let tables = catalog.list_tables(&config.skip_tables).await?;
    let edges = catalog.list_foreign_keys().await?;
    info!(tables = tables.len(), edges = edges.len(), "catalog loaded");
    let graph = RelationGraph::from_edges(edges);
    if config.print_graph {
        println!("{}", graph.to_graphviz());
    }

    let bar = progress_bar(tables.len() as u64);

    let mut snapshot_config = SnapshotConfig::new(config.seed.clone());
    snapshot_config.sample_fraction = config.sample_fraction;
    snapshot_config.concurrency = config.concurrency;
    snapshot_config.strict = config.strict;
    snapshot_config.skip_tables = config.skip_tables.clone();
    snapshot_config.work_dir = config.work_dir.clone();

    let engine = SnapshotEngine::new(Arc::clone(&catalog), snapshot_config)
        .with_progress(progress_sink(bar.clone()));

    // Ctrl-C trips the cancellation token; in-flight copies abort at the
    // next chunk boundary and the stage barrier propagates the abort.
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling extraction");
            cancel.cancel();
        }
    });

    let report = engine.run(&tables, &graph).await?;
    bar.finish_with_message("extraction complete");

    info!("extracting database DDL");
    let dump = dump_tool.dump_schema(&config.params).await?;
    let split = split_schema_dump(&dump)?;
    std::fs::write(config.work_dir.join("ddl.sql"), &split.pre_data)?;
    std::fs::write(
        config.work_dir.join("fk_constraints.sql"),
        &split.fk_constraints,
    )?;

    let manifest = Manifest {
        run_id: report.run_id,
        database: catalog.database().to_string(),
        seed: config.seed.normalized(),
        sample_fraction: config.sample_fraction,
        created_at: chrono::Utc::now(),
        tables: report
            .copied
            .iter()
            .map(|c| ManifestTable {
                table: c.table.normalized(),
                rows: c.rows,
                sha256: c.sha256.clone(),
            })
            .collect(),
        unreachable: report.unreachable.iter().map(TableRef::normalized).collect(),
    };
    manifest::write_manifest(&config.work_dir, &manifest)?;

    let archive = PathBuf::from(format!("{}.tar.gz", catalog.database()));
    package_dir(&config.work_dir, &archive)?;

    Ok(RunSummary {
        archive,
        tables_copied: report.copied.len(),
        rows_copied: report.total_rows(),
        unreachable: report.unreachable.len(),
    })
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tables ({percent}%) | {msg}")
            .expect("valid progress template")
            .progress_chars("#>-"),
    );
    bar
}

fn progress_sink(bar: ProgressBar) -> ProgressSink {
    Arc::new(move |event| match event {
        ProgressEvent::Planned { total_tables } => bar.set_length(total_tables as u64),
        ProgressEvent::TableCopied { table, rows } => {
            bar.set_message(format!("{table}: {rows} rows"));
            bar.inc(1);
        }
        ProgressEvent::TableFailed { table } => {
            bar.set_message(format!("{table}: failed"));
            bar.inc(1);
        }
        ProgressEvent::TableEmpty { table } => {
            bar.set_message(format!("{table}: header only"));
            bar.inc(1);
        }
    })
}
