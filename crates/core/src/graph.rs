//! Directed multigraph of tables connected by foreign-key edges.
//!
//! Vertices are [`TableRef`]s keyed by normalized name; edges point from the
//! referencing table to the referenced table (child → parent). Parallel
//! edges (one per FK column pair) and cycles are permitted. The graph is
//! built once from catalog output and never mutated afterwards.

use crate::types::{ForeignKeyEdge, TableRef};
use std::collections::{BTreeMap, BTreeSet};

/// One layer of the layered topological sort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    /// Tables in this layer, sorted by normalized name.
    pub tables: Vec<TableRef>,
    /// True when the layer was emitted by collapsing a cyclic remainder
    /// instead of by in-degree elimination.
    pub cyclic: bool,
}

/// In-memory relation graph.
#[derive(Clone, Debug, Default)]
pub struct RelationGraph {
    vertices: BTreeMap<String, TableRef>,
    edges: Vec<ForeignKeyEdge>,
    // child normalized name -> parent normalized names
    parents: BTreeMap<String, BTreeSet<String>>,
    // parent normalized name -> child normalized names
    children: BTreeMap<String, BTreeSet<String>>,
}

impl RelationGraph {
    /// Build the graph from foreign-key edges. Every table mentioned on
    /// either side of an edge becomes a vertex.
    pub fn from_edges(edges: Vec<ForeignKeyEdge>) -> Self {
        let mut graph = RelationGraph::default();
        for edge in &edges {
            let child_key = edge.child.normalized();
            let parent_key = edge.parent.normalized();
            graph
                .vertices
                .entry(child_key.clone())
                .or_insert_with(|| edge.child.clone());
            graph
                .vertices
                .entry(parent_key.clone())
                .or_insert_with(|| edge.parent.clone());
            graph
                .parents
                .entry(child_key.clone())
                .or_default()
                .insert(parent_key.clone());
            graph
                .children
                .entry(parent_key)
                .or_default()
                .insert(child_key);
        }
        graph.edges = edges;
        graph
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether `table` participates in any foreign-key edge.
    pub fn contains(&self, table: &TableRef) -> bool {
        self.vertices.contains_key(&table.normalized())
    }

    /// All vertices, ordered by normalized name.
    pub fn vertices(&self) -> impl Iterator<Item = &TableRef> {
        self.vertices.values()
    }

    /// All edges, in catalog order.
    pub fn edges(&self) -> &[ForeignKeyEdge] {
        &self.edges
    }

    /// Tables reachable in one step following edge direction (the parents
    /// of `table`), ordered by normalized name.
    pub fn successors(&self, table: &TableRef) -> Vec<&TableRef> {
        self.neighbor_refs(self.parents.get(&table.normalized()))
    }

    /// Tables with an edge into `table` (the children of `table`), ordered
    /// by normalized name.
    pub fn predecessors(&self, table: &TableRef) -> Vec<&TableRef> {
        self.neighbor_refs(self.children.get(&table.normalized()))
    }

    /// Every edge connecting `child` to `parent`, one per FK column pair.
    pub fn edges_between(&self, child: &TableRef, parent: &TableRef) -> Vec<&ForeignKeyEdge> {
        self.edges
            .iter()
            .filter(|e| &e.child == child && &e.parent == parent)
            .collect()
    }

    /// Kahn-style layered topological sort.
    ///
    /// Each layer holds the vertices whose parents have all been emitted in
    /// earlier layers; for any edge child → parent, the parent's layer index
    /// is never greater than the child's. Self-referencing edges impose no
    /// inter-table ordering and are ignored. When elimination stalls, the
    /// remainder (the cyclic components and everything stuck behind them) is
    /// emitted as a single layer flagged cyclic.
    pub fn layered_topo_sort(&self) -> Vec<Layer> {
        let mut layers = Vec::new();
        let mut processed: BTreeSet<&str> = BTreeSet::new();

        while processed.len() < self.vertices.len() {
            let ready: Vec<&String> = self
                .vertices
                .keys()
                .filter(|key| !processed.contains(key.as_str()))
                .filter(|key| {
                    self.parents
                        .get(*key)
                        .map(|parents| {
                            parents
                                .iter()
                                .all(|p| p == *key || processed.contains(p.as_str()))
                        })
                        .unwrap_or(true)
                })
                .collect();

            if ready.is_empty() {
                let remainder: Vec<TableRef> = self
                    .vertices
                    .iter()
                    .filter(|(key, _)| !processed.contains(key.as_str()))
                    .map(|(_, table)| table.clone())
                    .collect();
                layers.push(Layer {
                    tables: remainder,
                    cyclic: true,
                });
                break;
            }

            layers.push(Layer {
                tables: ready
                    .iter()
                    .map(|key| self.vertices[key.as_str()].clone())
                    .collect(),
                cyclic: false,
            });
            for key in ready {
                processed.insert(key.as_str());
            }
        }

        layers
    }

    /// Depth-first traversal of the undirected closure of `seed`: every
    /// vertex reachable through successors and predecessors, in preorder,
    /// with lexicographic tie-breaking on normalized name. Returns an empty
    /// order when `seed` is not a vertex.
    pub fn traverse_from(&self, seed: &TableRef) -> Vec<TableRef> {
        let mut order = Vec::new();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut stack = vec![seed.normalized()];

        while let Some(key) = stack.pop() {
            if visited.contains(&key) {
                continue;
            }
            let Some(table) = self.vertices.get(&key) else {
                continue;
            };
            visited.insert(key.clone());
            order.push(table.clone());

            let mut neighbors: BTreeSet<&String> = BTreeSet::new();
            if let Some(parents) = self.parents.get(&key) {
                neighbors.extend(parents.iter());
            }
            if let Some(children) = self.children.get(&key) {
                neighbors.extend(children.iter());
            }
            // Reverse push order so the stack pops in ascending name order.
            for neighbor in neighbors.iter().rev() {
                if !visited.contains(*neighbor) {
                    stack.push((*neighbor).clone());
                }
            }
        }

        order
    }

    /// Render the distinct child → parent pairs as a DOT digraph.
    pub fn to_graphviz(&self) -> String {
        let mut out = String::from("digraph relations {\n");
        for (child, parents) in &self.parents {
            for parent in parents {
                out.push_str(&format!("    \"{child}\" -> \"{parent}\";\n"));
            }
        }
        out.push('}');
        out
    }

    fn neighbor_refs(&self, keys: Option<&BTreeSet<String>>) -> Vec<&TableRef> {
        keys.map(|set| set.iter().filter_map(|key| self.vertices.get(key)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlTypeCategory;

    fn edge(child: &str, child_col: &str, parent: &str, parent_col: &str) -> ForeignKeyEdge {
        ForeignKeyEdge {
            constraint: format!("{child}_{child_col}_fkey"),
            child: TableRef::parse(child),
            child_column: child_col.to_string(),
            parent: TableRef::parse(parent),
            parent_column: parent_col.to_string(),
            child_column_type: SqlTypeCategory::Integer,
        }
    }

    #[test]
    fn vertices_deduplicated_across_edges() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.b", "a_id", "public.a", "id"),
            edge("public.c", "a_id", "public.a", "id"),
        ]);
        assert_eq!(graph.len(), 3);
        assert!(graph.contains(&TableRef::parse("public.a")));
    }

    #[test]
    fn successors_and_predecessors() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.b", "a_id", "public.a", "id"),
            edge("public.c", "b_id", "public.b", "id"),
        ]);
        let b = TableRef::parse("public.b");
        let parents: Vec<String> = graph.successors(&b).iter().map(|t| t.normalized()).collect();
        let children: Vec<String> = graph
            .predecessors(&b)
            .iter()
            .map(|t| t.normalized())
            .collect();
        assert_eq!(parents, vec!["public.a"]);
        assert_eq!(children, vec!["public.c"]);
    }

    #[test]
    fn parallel_edges_are_kept() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.b", "a_id", "public.a", "id"),
            edge("public.b", "a_code", "public.a", "code"),
        ]);
        let b = TableRef::parse("public.b");
        let a = TableRef::parse("public.a");
        assert_eq!(graph.edges_between(&b, &a).len(), 2);
        assert_eq!(graph.successors(&b).len(), 1);
    }

    #[test]
    fn linear_chain_layers_parents_first() {
        // c references b references a: a must land before b before c.
        let graph = RelationGraph::from_edges(vec![
            edge("public.b", "a_id", "public.a", "id"),
            edge("public.c", "b_id", "public.b", "id"),
        ]);
        let layers = graph.layered_topo_sort();
        assert_eq!(layers.len(), 3);
        assert!(!layers[0].cyclic);
        assert_eq!(layers[0].tables, vec![TableRef::parse("public.a")]);
        assert_eq!(layers[1].tables, vec![TableRef::parse("public.b")]);
        assert_eq!(layers[2].tables, vec![TableRef::parse("public.c")]);
    }

    #[test]
    fn two_cycle_collapses_into_cyclic_layer() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.x", "y_id", "public.y", "id"),
            edge("public.y", "x_id", "public.x", "id"),
        ]);
        let layers = graph.layered_topo_sort();
        assert_eq!(layers.len(), 1);
        assert!(layers[0].cyclic);
        assert_eq!(layers[0].tables.len(), 2);
    }

    #[test]
    fn self_reference_does_not_stall_layering() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.emp", "manager_id", "public.emp", "id"),
            edge("public.task", "emp_id", "public.emp", "id"),
        ]);
        let layers = graph.layered_topo_sort();
        assert_eq!(layers.len(), 2);
        assert!(!layers[0].cyclic);
        assert_eq!(layers[0].tables, vec![TableRef::parse("public.emp")]);
        assert_eq!(layers[1].tables, vec![TableRef::parse("public.task")]);
    }

    #[test]
    fn traversal_covers_undirected_closure_deterministically() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.b", "a_id", "public.a", "id"),
            edge("public.c", "a_id", "public.a", "id"),
            edge("public.d", "c_id", "public.c", "id"),
        ]);
        let seed = TableRef::parse("public.c");
        let order: Vec<String> = graph
            .traverse_from(&seed)
            .iter()
            .map(|t| t.normalized())
            .collect();
        // Seed first, then its neighbors in name order, then theirs.
        assert_eq!(order, vec!["public.c", "public.a", "public.b", "public.d"]);
        // Stable across runs.
        let again: Vec<String> = graph
            .traverse_from(&seed)
            .iter()
            .map(|t| t.normalized())
            .collect();
        assert_eq!(order, again);
    }

    #[test]
    fn traversal_of_unknown_seed_is_empty() {
        let graph = RelationGraph::from_edges(vec![edge("public.b", "a_id", "public.a", "id")]);
        assert!(graph.traverse_from(&TableRef::parse("public.zzz")).is_empty());
    }

    #[test]
    fn graphviz_lists_each_pair_once() {
        let graph = RelationGraph::from_edges(vec![
            edge("public.b", "a_id", "public.a", "id"),
            edge("public.b", "a_code", "public.a", "code"),
        ]);
        let dot = graph.to_graphviz();
        assert_eq!(dot.matches("\"public.b\" -> \"public.a\"").count(), 1);
        assert!(dot.starts_with("digraph relations {"));
    }
}
