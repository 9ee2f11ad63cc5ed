//! Live-database catalog tests.
//!
//! These need a running PostgreSQL instance and are ignored by default.
//! Run with: `DBSLICE_TEST_DATABASE_URL=postgres://... cargo test -p
//! dbslice-catalog-postgres -- --ignored --nocapture`

use dbslice_catalog_postgres::PgCatalog;
use sqlx::postgres::PgPoolOptions;
use std::collections::BTreeSet;

async fn test_catalog() -> PgCatalog {
    let url = std::env::var("DBSLICE_TEST_DATABASE_URL")
        .expect("DBSLICE_TEST_DATABASE_URL must point at a test database");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to test database");
    PgCatalog::from_pool(pool, "test")
}

#[tokio::test]
#[ignore]
async fn server_version_has_sane_major() {
    let catalog = test_catalog().await;
    let version = catalog.server_version().await.expect("server version");
    assert!(version.major >= 12, "unexpected major: {version}");
}

#[tokio::test]
#[ignore]
async fn lists_tables_without_system_schemas() {
    let catalog = test_catalog().await;
    let tables = catalog
        .list_tables(&BTreeSet::new())
        .await
        .expect("list tables");
    assert!(tables
        .iter()
        .all(|t| t.table.schema != "pg_catalog" && t.table.schema != "information_schema"));
    assert!(tables.iter().all(|t| !t.columns.is_empty()));
}

#[tokio::test]
#[ignore]
async fn foreign_keys_reference_listed_tables() {
    let catalog = test_catalog().await;
    let tables = catalog
        .list_tables(&BTreeSet::new())
        .await
        .expect("list tables");
    let names: BTreeSet<String> = tables.iter().map(|t| t.table.normalized()).collect();
    for edge in catalog.list_foreign_keys().await.expect("list fks") {
        assert!(names.contains(&edge.child.normalized()));
        assert!(names.contains(&edge.parent.normalized()));
    }
}
