//! Server-driven bulk output: `COPY (<query>) TO STDOUT` as a CSV stream.

use crate::catalog::PgCatalog;
use crate::error::CatalogError;
use dbslice_core::csv::CsvRowCounter;
use dbslice_core::types::TableRef;
use futures::TryStreamExt;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolCopyExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// What a completed bulk copy produced.
#[derive(Clone, Debug)]
pub struct CopyStats {
    /// Data rows written (header excluded)
    pub rows: u64,
    /// Total bytes streamed, header included
    pub bytes: u64,
    /// Hex SHA-256 digest of the streamed bytes
    pub sha256: String,
}

impl PgCatalog {
    /// Stream `SELECT` results for one table into `out` as CSV with a
    /// header row, counting rows with a quote-aware scanner and digesting
    /// the bytes on the way through. The caller owns retry policy; a broken
    /// stream surfaces as [`CatalogError::CopyFailed`].
    pub async fn copy_out<W>(
        &self,
        table: &TableRef,
        select_sql: &str,
        out: &mut W,
    ) -> Result<CopyStats, CatalogError>
    where
        W: AsyncWrite + Unpin,
    {
        let copy_sql = format!("COPY ({select_sql}) TO STDOUT WITH (FORMAT CSV, HEADER TRUE)");
        let mut stream = self
            .pool()
            .copy_out_raw(&copy_sql)
            .await
            .map_err(|source| CatalogError::CopyFailed {
                table: table.normalized(),
                source,
            })?;

        let mut counter = CsvRowCounter::new();
        let mut hasher = Sha256::new();
        let mut bytes: u64 = 0;

        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|source| CatalogError::CopyFailed {
                table: table.normalized(),
                source,
            })?
        {
            counter.feed(&chunk);
            hasher.update(&chunk);
            bytes += chunk.len() as u64;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        Ok(CopyStats {
            rows: counter.data_rows(),
            bytes,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}
