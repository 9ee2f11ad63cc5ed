//! Per-table SELECT construction.
//!
//! The seed gets a plain `LIMIT` sample. Every other table is restricted to
//! rows required by its already-extracted neighbors: for each foreign-key
//! edge touching an extracted neighbor, the referenced column is projected
//! out of the neighbor's materialized CSV and rendered as an `IN` list.
//! Clauses from all contributing edges are OR-combined, which follows both
//! FK directions — parents needed by extracted children, and children whose
//! targets are already in the subset.

use crate::error::SnapshotError;
use dbslice_core::csv::project_column_distinct;
use dbslice_core::graph::RelationGraph;
use dbslice_core::types::{quote_ident, ForeignKeyEdge, SqlTypeCategory, TableRef};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Seed-stage sample: `SELECT * FROM seed LIMIT round(rows × fraction)`.
pub fn seed_select(seed: &TableRef, estimated_rows: i64, fraction: f64) -> String {
    let limit = (estimated_rows.max(0) as f64 * fraction).round() as i64;
    format!("SELECT * FROM {} LIMIT {}", seed.quoted(), limit)
}

/// Builds restriction predicates by reading already-materialized CSVs.
pub struct PredicateBuilder<'a> {
    graph: &'a RelationGraph,
    work_dir: &'a Path,
    strict: bool,
}

impl<'a> PredicateBuilder<'a> {
    /// Builder over `graph`, reading artifacts below `work_dir`.
    pub fn new(graph: &'a RelationGraph, work_dir: &'a Path, strict: bool) -> Self {
        PredicateBuilder {
            graph,
            work_dir,
            strict,
        }
    }

    /// The restricted SELECT for `table`, or `None` when no extracted
    /// neighbor contributes any values yet (the caller re-visits such
    /// tables on a later pass).
    pub fn build_select(
        &self,
        table: &TableRef,
        extracted: &BTreeSet<String>,
    ) -> Result<Option<String>, SnapshotError> {
        let mut clauses = Vec::new();

        // Table is the child: pull rows whose FK values point into
        // already-extracted parents.
        for parent in self.graph.successors(table) {
            if parent == table || !extracted.contains(&parent.normalized()) {
                continue;
            }
            for edge in self.graph.edges_between(table, parent) {
                if let Some(clause) =
                    self.edge_clause(edge, parent, &edge.parent_column, &edge.child_column)?
                {
                    clauses.push(clause);
                }
            }
        }

        // Table is the parent: pull rows that already-extracted children
        // reference.
        for child in self.graph.predecessors(table) {
            if child == table || !extracted.contains(&child.normalized()) {
                continue;
            }
            for edge in self.graph.edges_between(child, table) {
                if let Some(clause) =
                    self.edge_clause(edge, child, &edge.child_column, &edge.parent_column)?
                {
                    clauses.push(clause);
                }
            }
        }

        if clauses.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "SELECT * FROM {} WHERE {}",
            table.quoted(),
            clauses.join(" OR ")
        )))
    }

    /// One `local IN (...)` clause from a single edge, projecting
    /// `neighbor_column` out of the neighbor's CSV. `None` when the
    /// neighbor's artifact is missing (its copy failed), when the projected
    /// column holds no usable values, or when the edge's type category is
    /// unsupported and strict mode is off.
    fn edge_clause(
        &self,
        edge: &ForeignKeyEdge,
        neighbor: &TableRef,
        neighbor_column: &str,
        local_column: &str,
    ) -> Result<Option<String>, SnapshotError> {
        if edge.child_column_type == SqlTypeCategory::Other {
            if self.strict {
                return Err(SnapshotError::UnsupportedColumnType {
                    table: edge.child.normalized(),
                    column: edge.child_column.clone(),
                    constraint: edge.constraint.clone(),
                });
            }
            warn!(
                constraint = %edge.constraint,
                table = %edge.child,
                column = %edge.child_column,
                "unsupported column type, ignoring foreign-key edge"
            );
            return Ok(None);
        }

        let csv_path = self.artifact_csv(neighbor);
        if !csv_path.exists() {
            return Ok(None);
        }

        let values = project_column_distinct(&csv_path, neighbor_column)?;
        if values.is_empty() {
            return Ok(None);
        }

        let literals: Vec<String> = values
            .iter()
            .filter_map(|v| edge.child_column_type.render_literal(v))
            .collect();

        Ok(Some(format!(
            "{} IN ({})",
            quote_ident(local_column),
            literals.join(",")
        )))
    }

    fn artifact_csv(&self, table: &TableRef) -> PathBuf {
        self.work_dir.join(table.normalized()).join("data.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn edge_with_type(
        child: &str,
        child_col: &str,
        parent: &str,
        parent_col: &str,
        category: SqlTypeCategory,
    ) -> ForeignKeyEdge {
        ForeignKeyEdge {
            constraint: format!("{child}_{child_col}_fkey"),
            child: TableRef::parse(child),
            child_column: child_col.to_string(),
            parent: TableRef::parse(parent),
            parent_column: parent_col.to_string(),
            child_column_type: category,
        }
    }

    fn write_artifact(dir: &TempDir, table: &str, contents: &str) {
        let table_dir = dir.path().join(table);
        fs::create_dir_all(&table_dir).unwrap();
        fs::write(table_dir.join("data.csv"), contents).unwrap();
    }

    fn extracted(tables: &[&str]) -> BTreeSet<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn seed_select_rounds_the_sample() {
        let seed = TableRef::parse("public.a");
        assert_eq!(
            seed_select(&seed, 1000, 0.01),
            "SELECT * FROM \"public\".\"a\" LIMIT 10"
        );
        // round(100 × 0.001) = 0: a tiny fraction of a small table
        // legitimately samples nothing.
        assert_eq!(
            seed_select(&seed, 100, 0.001),
            "SELECT * FROM \"public\".\"a\" LIMIT 0"
        );
        assert_eq!(
            seed_select(&seed, 150, 0.01),
            "SELECT * FROM \"public\".\"a\" LIMIT 2"
        );
        assert_eq!(
            seed_select(&seed, 0, 0.5),
            "SELECT * FROM \"public\".\"a\" LIMIT 0"
        );
    }

    #[test]
    fn child_pulls_rows_pointing_at_extracted_parent() {
        let dir = TempDir::new().unwrap();
        write_artifact(&dir, "public.a", "id,name\n1,x\n2,y\n");
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_id",
            "public.a",
            "id",
            SqlTypeCategory::Integer,
        )]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(&TableRef::parse("public.b"), &extracted(&["public.a"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"public\".\"b\" WHERE \"a_id\" IN (1,2)"
        );
    }

    #[test]
    fn parent_pulls_rows_referenced_by_extracted_child() {
        let dir = TempDir::new().unwrap();
        write_artifact(&dir, "public.b", "id,a_id\n10,1\n11,2\n12,1\n");
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_id",
            "public.a",
            "id",
            SqlTypeCategory::Integer,
        )]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(&TableRef::parse("public.a"), &extracted(&["public.b"]))
            .unwrap()
            .unwrap();
        // Distinct values, first occurrence order.
        assert_eq!(sql, "SELECT * FROM \"public\".\"a\" WHERE \"id\" IN (1,2)");
    }

    #[test]
    fn text_values_are_quoted_and_escaped() {
        let dir = TempDir::new().unwrap();
        write_artifact(&dir, "public.a", "code,name\nab,x\no'c,y\n");
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_code",
            "public.a",
            "code",
            SqlTypeCategory::Text,
        )]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(&TableRef::parse("public.b"), &extracted(&["public.a"]))
            .unwrap()
            .unwrap();
        assert!(sql.contains("\"a_code\" IN ('ab','o''c')"));
    }

    #[test]
    fn null_foreign_keys_are_skipped() {
        let dir = TempDir::new().unwrap();
        write_artifact(&dir, "public.b", "id,a_id\n10,1\n11,\n");
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_id",
            "public.a",
            "id",
            SqlTypeCategory::Integer,
        )]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(&TableRef::parse("public.a"), &extracted(&["public.b"]))
            .unwrap()
            .unwrap();
        assert!(sql.ends_with("\"id\" IN (1)"));
    }

    #[test]
    fn no_extracted_neighbor_yields_no_select() {
        let dir = TempDir::new().unwrap();
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_id",
            "public.a",
            "id",
            SqlTypeCategory::Integer,
        )]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(&TableRef::parse("public.b"), &BTreeSet::new())
            .unwrap();
        assert!(sql.is_none());
    }

    #[test]
    fn missing_neighbor_artifact_contributes_nothing() {
        // Neighbor marked extracted but its copy failed: no CSV on disk.
        let dir = TempDir::new().unwrap();
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_id",
            "public.a",
            "id",
            SqlTypeCategory::Integer,
        )]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(&TableRef::parse("public.b"), &extracted(&["public.a"]))
            .unwrap();
        assert!(sql.is_none());
    }

    #[test]
    fn unsupported_type_is_fatal_in_strict_mode() {
        let dir = TempDir::new().unwrap();
        write_artifact(&dir, "public.a", "id,name\nu1,x\n");
        let graph = RelationGraph::from_edges(vec![edge_with_type(
            "public.b",
            "a_id",
            "public.a",
            "id",
            SqlTypeCategory::Other,
        )]);
        let strict = PredicateBuilder::new(&graph, dir.path(), true);
        let err = strict
            .build_select(&TableRef::parse("public.b"), &extracted(&["public.a"]))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedColumnType { .. }));

        // Non-strict: the edge is dropped and the table waits.
        let lenient = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = lenient
            .build_select(&TableRef::parse("public.b"), &extracted(&["public.a"]))
            .unwrap();
        assert!(sql.is_none());
    }

    #[test]
    fn clauses_from_both_directions_are_or_combined() {
        let dir = TempDir::new().unwrap();
        write_artifact(&dir, "public.a", "id\n1\n");
        write_artifact(&dir, "public.c", "id,b_id\n5,7\n");
        let graph = RelationGraph::from_edges(vec![
            edge_with_type("public.b", "a_id", "public.a", "id", SqlTypeCategory::Integer),
            edge_with_type("public.c", "b_id", "public.b", "id", SqlTypeCategory::Integer),
        ]);
        let builder = PredicateBuilder::new(&graph, dir.path(), false);
        let sql = builder
            .build_select(
                &TableRef::parse("public.b"),
                &extracted(&["public.a", "public.c"]),
            )
            .unwrap()
            .unwrap();
        assert!(sql.contains("\"a_id\" IN (1)"));
        assert!(sql.contains(" OR "));
        assert!(sql.contains("\"id\" IN (7)"));
    }
}
