//! Error types for snapshot planning, extraction, and packaging.

use dbslice_catalog_postgres::{CatalogError, ServerVersion};
use dbslice_core::CoreError;

/// Errors raised while producing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Catalog or bulk-copy failure
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Core model or CSV projection failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The server and the schema-dump tool disagree on major version.
    #[error("server major version {server} does not match dump tool version {tool}")]
    VersionMismatch {
        /// Version reported by the server
        server: ServerVersion,
        /// Version reported by the dump tool
        tool: ServerVersion,
    },

    /// A foreign-key column's type category cannot be rendered as a literal.
    #[error("unsupported column type for {table}.{column} (constraint {constraint})")]
    UnsupportedColumnType {
        /// Table owning the unsupported column
        table: String,
        /// The column itself
        column: String,
        /// Constraint the column belongs to
        constraint: String,
    },

    /// The schema dump contained no statements at all.
    #[error("schema dump produced no statements")]
    EmptyDump,

    /// The external schema-dump tool could not be run or exited nonzero.
    #[error("schema dump tool failed: {0}")]
    DumpToolFailed(String),

    /// Writing the archive failed.
    #[error("packaging failed: {0}")]
    PackagingFailed(String),

    /// The requested seed table is not in the catalog.
    #[error("seed table {0} is not in the catalog")]
    SeedMissing(String),

    /// The sample fraction is outside `(0, 1]`.
    #[error("sample fraction {0} is outside (0, 1]")]
    InvalidSampleFraction(f64),

    /// Extraction was cancelled before completion.
    #[error("extraction cancelled")]
    Cancelled,

    /// An extraction worker panicked or was torn down unexpectedly.
    #[error("extraction worker failed: {0}")]
    Worker(String),

    /// CSV write failure (header-only artifacts)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `table.bin` encoding failure
    #[error("metadata encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// Manifest serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
