//! dbslice-core
//!
//! Core domain models for referentially consistent subset extraction:
//! table identity, SQL type categories, the foreign-key relation graph,
//! and the CSV column projection used to close the FK subset on disk.

pub mod csv;
pub mod error;
pub mod graph;
pub mod types;

pub use error::CoreError;
pub use graph::{Layer, RelationGraph};
pub use types::{Column, ForeignKeyEdge, SqlTypeCategory, TableDescriptor, TableRef};
