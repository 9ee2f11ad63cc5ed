//! dbslice-catalog-postgres
//!
//! PostgreSQL-backed catalog access for subset extraction: table and
//! foreign-key introspection over `information_schema`, row-count
//! estimates, server version lookup, and the raw `COPY ... TO STDOUT`
//! stream that materializes table data as CSV.

pub mod catalog;
pub mod copy;
pub mod error;
pub mod params;
pub mod version;

pub use catalog::PgCatalog;
pub use copy::CopyStats;
pub use error::CatalogError;
pub use params::ConnectionParams;
pub use version::ServerVersion;
