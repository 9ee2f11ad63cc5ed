//! Catalog introspection over a PostgreSQL connection pool.

use crate::error::CatalogError;
use crate::params::ConnectionParams;
use crate::version::ServerVersion;
use dbslice_core::types::{Column, ForeignKeyEdge, SqlTypeCategory, TableDescriptor, TableRef};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::BTreeSet;
use tracing::debug;

/// Catalog access for one database.
///
/// Wraps a connection pool sized to the extraction concurrency; the pool is
/// the only shared mutable resource in the pipeline, and workers check
/// connections out of it per bulk copy.
pub struct PgCatalog {
    pool: PgPool,
    database: String,
}

impl PgCatalog {
    /// Connect with a pool sized for `max_connections` concurrent workers.
    pub async fn connect(
        params: &ConnectionParams,
        max_connections: u32,
    ) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(&params.url())
            .await?;
        Ok(PgCatalog {
            pool,
            database: params.database.clone(),
        })
    }

    /// Wrap an existing pool (used by tests).
    pub fn from_pool(pool: PgPool, database: impl Into<String>) -> Self {
        PgCatalog {
            pool,
            database: database.into(),
        }
    }

    /// The connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Name of the connected database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Server version, for the driver's dump-tool compatibility check.
    pub async fn server_version(&self) -> Result<ServerVersion, CatalogError> {
        let raw: String = sqlx::query_scalar("SELECT current_setting('server_version')")
            .fetch_one(&self.pool)
            .await?;
        ServerVersion::parse(&raw)
    }

    /// Every user table not in `skip` (a set of normalized names), with its
    /// column list in ordinal order. Deterministic ordering across
    /// invocations on the same catalog.
    pub async fn list_tables(
        &self,
        skip: &BTreeSet<String>,
    ) -> Result<Vec<TableDescriptor>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT c.table_schema, c.table_name, c.column_name, c.data_type
            FROM information_schema.columns c
            JOIN information_schema.tables t
              ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE t.table_type = 'BASE TABLE'
              AND t.table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY c.table_schema, c.table_name, c.ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Unavailable(format!("table listing failed: {e}")))?;

        let mut tables: Vec<TableDescriptor> = Vec::new();
        for row in rows {
            let schema: String = row.try_get("table_schema")?;
            let name: String = row.try_get("table_name")?;
            let table = TableRef::new(schema, name);
            if skip.contains(&table.normalized()) {
                continue;
            }

            let column_name: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            let column = Column::new(column_name, SqlTypeCategory::from_data_type(&data_type));

            match tables.last_mut() {
                Some(last) if last.table == table => last.columns.push(column),
                _ => tables.push(TableDescriptor::new(table, vec![column])),
            }
        }

        debug!(tables = tables.len(), "listed user tables");
        Ok(tables)
    }

    /// Every foreign-key column pair in the database, one edge per pair.
    /// Multi-column constraints contribute one edge per column, all sharing
    /// the constraint name.
    pub async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT
                tc.constraint_name,
                tc.table_schema  AS child_schema,
                tc.table_name    AS child_table,
                kcu.column_name  AS child_column,
                ccu.table_schema AS parent_schema,
                ccu.table_name   AS parent_table,
                ccu.column_name  AS parent_column,
                col.data_type    AS child_data_type
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_name = tc.constraint_name
             AND kcu.table_schema = tc.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.constraint_schema = tc.constraint_schema
            JOIN information_schema.columns col
              ON col.table_schema = tc.table_schema
             AND col.table_name = tc.table_name
             AND col.column_name = kcu.column_name
            WHERE tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.table_schema, tc.table_name, tc.constraint_name,
                     kcu.ordinal_position, ccu.column_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Unavailable(format!("foreign key listing failed: {e}")))?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            let child_data_type: String = row.try_get("child_data_type")?;
            edges.push(ForeignKeyEdge {
                constraint: row.try_get("constraint_name")?,
                child: TableRef::new(
                    row.try_get::<String, _>("child_schema")?,
                    row.try_get::<String, _>("child_table")?,
                ),
                child_column: row.try_get("child_column")?,
                parent: TableRef::new(
                    row.try_get::<String, _>("parent_schema")?,
                    row.try_get::<String, _>("parent_table")?,
                ),
                parent_column: row.try_get("parent_column")?,
                child_column_type: SqlTypeCategory::from_data_type(&child_data_type),
            });
        }

        debug!(edges = edges.len(), "listed foreign keys");
        Ok(edges)
    }

    /// Cheap row-count estimate from the planner statistics, falling back to
    /// an exact `count(*)` when the table has never been analyzed (the
    /// statistics report a negative count in that case).
    pub async fn estimate_row_count(&self, table: &TableRef) -> Result<i64, CatalogError> {
        // to_regclass parses its argument as an identifier, so the name must
        // be quoted the same way the generated SQL quotes it.
        let estimate: Option<i64> =
            sqlx::query_scalar("SELECT reltuples::bigint FROM pg_class WHERE oid = to_regclass($1)")
                .bind(table.quoted())
                .fetch_optional(&self.pool)
                .await?;

        match estimate {
            Some(count) if count >= 0 => Ok(count),
            _ => {
                debug!(table = %table, "no planner estimate, counting exactly");
                let exact: i64 =
                    sqlx::query_scalar(&format!("SELECT count(*) FROM {}", table.quoted()))
                        .fetch_one(&self.pool)
                        .await?;
                Ok(exact)
            }
        }
    }
}
