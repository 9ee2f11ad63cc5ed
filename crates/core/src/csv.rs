//! Quoting-aware access to materialized CSV artifacts.
//!
//! The extractor writes each table's rows exactly as the database's bulk-copy
//! CSV mode emits them (RFC-4180 style, `"` quoting doubled for escape,
//! header row present, newlines permitted inside quoted fields). The readers
//! here speak the same dialect, because the planner treats those files as the
//! ground truth when projecting foreign-key values for later stages.

use crate::error::CoreError;
use std::collections::HashSet;
use std::path::Path;

/// Project a single named column out of a CSV file, in row order. Values are
/// returned raw (unquoted); empty fields are the bulk-copy rendering of NULL
/// and are included as empty strings.
pub fn project_column(path: &Path, column: &str) -> Result<Vec<String>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)?;

    let idx = reader
        .headers()?
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| CoreError::ColumnMissing {
            column: column.to_string(),
            path: path.display().to_string(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(idx) {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

/// Project a column and reduce it to the distinct non-null values, first
/// occurrence order preserved. Empty fields are skipped: a NULL can never
/// satisfy a foreign-key reference.
pub fn project_column_distinct(path: &Path, column: &str) -> Result<Vec<String>, CoreError> {
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for value in project_column(path, column)? {
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.clone()) {
            distinct.push(value);
        }
    }
    Ok(distinct)
}

/// Incremental row counter for a streamed CSV byte sequence.
///
/// Counts record terminators (`\n` outside quoted fields), so fields
/// containing embedded newlines are not over-counted. Feed chunks in stream
/// order; quote state carries across chunk boundaries.
#[derive(Debug, Default)]
pub struct CsvRowCounter {
    in_quotes: bool,
    lines: u64,
}

impl CsvRowCounter {
    /// Fresh counter.
    pub fn new() -> Self {
        CsvRowCounter::default()
    }

    /// Consume the next chunk of the stream.
    pub fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            match byte {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes => self.lines += 1,
                _ => {}
            }
        }
    }

    /// Total lines seen, header included.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Data rows seen (lines minus the header row).
    pub fn data_rows(&self) -> u64 {
        self.lines.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write fixture");
        file
    }

    #[test]
    fn projects_named_column() {
        let file = csv_fixture("id,name\n1,alpha\n2,beta\n");
        let values = project_column(file.path(), "name").unwrap();
        assert_eq!(values, vec!["alpha", "beta"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let file = csv_fixture("id,name\n1,alpha\n");
        let err = project_column(file.path(), "nope").unwrap_err();
        assert!(matches!(err, CoreError::ColumnMissing { .. }));
    }

    #[test]
    fn quoted_fields_with_newlines_and_commas() {
        let file = csv_fixture("id,note\n1,\"line one\nline two\"\n2,\"a,b\"\n");
        let values = project_column(file.path(), "note").unwrap();
        assert_eq!(values, vec!["line one\nline two", "a,b"]);
    }

    #[test]
    fn distinct_skips_nulls_and_duplicates_preserving_order() {
        let file = csv_fixture("id,ref\n1,x\n2,\n3,y\n4,x\n");
        let values = project_column_distinct(file.path(), "ref").unwrap();
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn row_counter_handles_embedded_newlines() {
        let mut counter = CsvRowCounter::new();
        counter.feed(b"id,note\n1,\"line one\nline two\"\n2,plain\n");
        assert_eq!(counter.lines(), 3);
        assert_eq!(counter.data_rows(), 2);
    }

    #[test]
    fn row_counter_quote_state_survives_chunk_boundary() {
        let mut counter = CsvRowCounter::new();
        counter.feed(b"id,note\n1,\"open");
        counter.feed(b" still open\n");
        counter.feed(b"closed\"\n");
        assert_eq!(counter.data_rows(), 1);
    }

    #[test]
    fn empty_stream_has_no_rows() {
        let counter = CsvRowCounter::new();
        assert_eq!(counter.data_rows(), 0);
    }
}
