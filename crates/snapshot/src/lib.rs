//! dbslice-snapshot
//!
//! Everything between a live catalog and a finished snapshot archive: the
//! layered execution plan, foreign-key predicate construction over
//! materialized CSVs, the bounded-concurrency extractor, the DDL splitter,
//! and the tar.gz packager.

pub mod archive;
pub mod cancel;
pub mod config;
pub mod ddl;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod manifest;
pub mod metadata;
pub mod plan;
pub mod predicate;
pub mod schema_dump;

pub use cancel::CancelToken;
pub use config::{parse_skip_tables, SnapshotConfig};
pub use engine::{ProgressEvent, ProgressSink, SnapshotEngine, SnapshotReport};
pub use error::SnapshotError;
pub use schema_dump::SchemaDumpTool;
