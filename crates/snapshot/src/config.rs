//! Snapshot run configuration.

use crate::error::SnapshotError;
use dbslice_core::TableRef;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Everything the engine needs to know about one snapshot run.
///
/// The working directory is injected here rather than being process-global,
/// so parallel invocations against different databases can coexist.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// The one table sampled directly; everything else is restricted to the
    /// seed's closure.
    pub seed: TableRef,
    /// Fraction of the seed table to sample, in `(0, 1]`.
    pub sample_fraction: f64,
    /// Maximum concurrent bulk-copy operations.
    pub concurrency: usize,
    /// Promote per-table failures to process failure.
    pub strict: bool,
    /// Normalized names of tables to leave out entirely.
    pub skip_tables: BTreeSet<String>,
    /// Working directory for artifacts before packaging.
    pub work_dir: PathBuf,
}

impl SnapshotConfig {
    /// Defaults for everything but the seed.
    pub fn new(seed: TableRef) -> Self {
        SnapshotConfig {
            seed,
            sample_fraction: 0.05,
            concurrency: 4,
            strict: false,
            skip_tables: BTreeSet::new(),
            work_dir: PathBuf::from("data-dump"),
        }
    }

    /// Reject configurations the planner cannot honor.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(SnapshotError::InvalidSampleFraction(self.sample_fraction));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of table names into a normalized skip set.
/// Bare names default to the `public` schema; empty entries are dropped.
pub fn parse_skip_tables(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| TableRef::parse(part).normalized())
        .collect()
}
