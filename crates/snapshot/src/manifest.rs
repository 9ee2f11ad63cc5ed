//! Snapshot manifest: a self-describing summary that rides along in the
//! archive root.

use crate::error::SnapshotError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// One table's entry in the manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestTable {
    /// Normalized table name
    pub table: String,
    /// Rows in the table's `data.csv`
    pub rows: u64,
    /// Hex SHA-256 digest of the table's `data.csv`
    pub sha256: String,
}

/// Top-level manifest, serialized as `manifest.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Identity of this snapshot run
    pub run_id: Uuid,
    /// Source database name
    pub database: String,
    /// Normalized seed table name
    pub seed: String,
    /// Sample fraction applied to the seed
    pub sample_fraction: f64,
    /// When the manifest was written
    pub created_at: DateTime<Utc>,
    /// Extracted tables
    pub tables: Vec<ManifestTable>,
    /// Tables unreachable under the seed (header-only artifacts)
    pub unreachable: Vec<String>,
}

/// File name used inside the working tree and archive.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Write the manifest into `work_dir`.
pub fn write_manifest(work_dir: &Path, manifest: &Manifest) -> Result<(), SnapshotError> {
    let rendered = serde_json::to_string_pretty(manifest)?;
    fs::write(work_dir.join(MANIFEST_FILE), rendered)?;
    Ok(())
}

/// Read a manifest back from `work_dir` (inspection tooling and tests).
pub fn read_manifest(work_dir: &Path) -> Result<Manifest, SnapshotError> {
    let raw = fs::read_to_string(work_dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&raw)?)
}
