//! Layered execution plan derived from the relation graph and a seed.

use dbslice_core::graph::{Layer, RelationGraph};
use dbslice_core::TableRef;
use std::collections::BTreeSet;

/// The order in which tables are extracted.
///
/// Stage 0 holds the seed alone. Later stages come from the inverted
/// layered topological sort, restricted to the seed's undirected closure,
/// so tables referencing already-extracted data are attempted as early as
/// possible. `traversal` is the deterministic fixed-point ordering used to
/// re-visit tables the staged passes could not reach (cyclic components).
#[derive(Clone, Debug)]
pub struct ExecutionPlan {
    /// Extraction stages; members of one stage run concurrently.
    pub stages: Vec<Layer>,
    /// Undirected-closure traversal order from the seed.
    pub traversal: Vec<TableRef>,
}

impl ExecutionPlan {
    /// Build the plan for `seed`. A seed without any foreign-key edge
    /// yields a single-stage plan covering just the seed.
    pub fn build(graph: &RelationGraph, seed: &TableRef) -> Self {
        let mut traversal = graph.traverse_from(seed);
        if traversal.is_empty() {
            traversal.push(seed.clone());
        }
        let in_scope: BTreeSet<String> = traversal.iter().map(TableRef::normalized).collect();

        let mut stages = vec![Layer {
            tables: vec![seed.clone()],
            cyclic: false,
        }];

        for layer in graph.layered_topo_sort().into_iter().rev() {
            let tables: Vec<TableRef> = layer
                .tables
                .into_iter()
                .filter(|t| t != seed && in_scope.contains(&t.normalized()))
                .collect();
            if !tables.is_empty() {
                stages.push(Layer {
                    tables,
                    cyclic: layer.cyclic,
                });
            }
        }

        ExecutionPlan { stages, traversal }
    }

    /// Number of distinct tables the plan covers.
    pub fn table_count(&self) -> usize {
        self.traversal.len()
    }
}
