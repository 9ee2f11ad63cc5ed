//! Error types for the core data model.

/// Errors raised by the core model and CSV plumbing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A projected column is absent from a materialized CSV header.
    #[error("column {column} not present in {path}")]
    ColumnMissing {
        /// Column that was requested
        column: String,
        /// CSV file that was read
        path: String,
    },

    /// CSV parse or read failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO failure while reading a materialized artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
