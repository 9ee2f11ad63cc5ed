//! Error types for catalog access.

/// Errors raised while talking to the database.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A catalog introspection query failed.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// Any other database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The bulk-copy stream for a table broke.
    #[error("bulk copy failed for {table}")]
    CopyFailed {
        /// Normalized name of the table being copied
        table: String,
        /// Underlying driver error
        #[source]
        source: sqlx::Error,
    },

    /// The server or tool version string could not be parsed.
    #[error("unparseable version string: {0:?}")]
    VersionParse(String),

    /// IO failure while writing streamed bytes
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Whether retrying the operation once is worthwhile. Only network-level
    /// driver failures qualify; everything else is deterministic.
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Sqlx(source) => sqlx_transient(source),
            CatalogError::CopyFailed { source, .. } => sqlx_transient(source),
            _ => false,
        }
    }
}

fn sqlx_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
    )
}
