//! Per-table binary metadata records (`table.bin`).
//!
//! The record is a u32 little-endian length prefix followed by a bincode
//! payload. The format is consumed by the restore path and by inspection
//! tools, so it must stay stable: fields are only ever appended.

use crate::error::SnapshotError;
use dbslice_core::types::{Column, TableDescriptor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

/// Serialized form of one extracted table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Schema the table lives in
    pub schema: String,
    /// Table name
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
    /// Rows in the companion `data.csv`
    pub row_count: u64,
    /// Hex SHA-256 digest of the companion `data.csv`
    pub sha256: String,
}

impl TableRecord {
    /// Build a record from a descriptor plus what the copy observed.
    pub fn new(descriptor: &TableDescriptor, row_count: u64, sha256: String) -> Self {
        TableRecord {
            schema: descriptor.table.schema.clone(),
            name: descriptor.table.name.clone(),
            columns: descriptor.columns.clone(),
            row_count,
            sha256,
        }
    }
}

/// Write a length-prefixed record to `path`.
pub fn write_table_record(path: &Path, record: &TableRecord) -> Result<(), SnapshotError> {
    let payload = bincode::serialize(record)?;
    let mut file = fs::File::create(path)?;
    file.write_all(&(payload.len() as u32).to_le_bytes())?;
    file.write_all(&payload)?;
    Ok(())
}

/// Read a record back, verifying the length prefix.
pub fn read_table_record(path: &Path) -> Result<TableRecord, SnapshotError> {
    let mut file = fs::File::open(path)?;
    let mut prefix = [0u8; 4];
    file.read_exact(&mut prefix)?;
    let len = u32::from_le_bytes(prefix) as usize;
    let mut payload = vec![0u8; len];
    file.read_exact(&mut payload)?;
    Ok(bincode::deserialize(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbslice_core::types::{SqlTypeCategory, TableRef};
    use tempfile::TempDir;

    fn sample_record() -> TableRecord {
        let descriptor = TableDescriptor::new(
            TableRef::parse("public.orders"),
            vec![
                Column::new("id", SqlTypeCategory::Integer),
                Column::new("customer", SqlTypeCategory::Text),
            ],
        );
        TableRecord::new(&descriptor, 42, "deadbeef".into())
    }

    #[test]
    fn round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.bin");
        let record = sample_record();
        write_table_record(&path, &record).unwrap();
        assert_eq!(read_table_record(&path).unwrap(), record);
    }

    #[test]
    fn length_prefix_matches_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.bin");
        write_table_record(&path, &sample_record()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        assert_eq!(bytes.len(), 4 + len);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.bin");
        write_table_record(&path, &sample_record()).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 1);
        std::fs::write(&path, bytes).unwrap();
        assert!(read_table_record(&path).is_err());
    }
}
