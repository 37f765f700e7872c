//! Petgraph construction from a work-item snapshot.
//!
//! ## Edge Direction
//!
//! An edge `A → B` means "A **blocks** B": B lists A as a dependency, so A
//! must be completed before B can start.
//!
//! ## Only Incomplete Items
//!
//! Completed items no longer constrain scheduling, so they and their edges
//! are left out. Every remaining item is a node even when it has no edges.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use sdd_core::graph::deps::DependencyGraph;
use sdd_core::model::{Priority, WorkItem};
use tracing::instrument;

/// Node payload: the item id plus what analytics need from the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageNode {
    pub id: String,
    /// Duration weight on a chain (estimate, or 1).
    pub weight: u64,
    pub priority: Priority,
}

/// Directed graph over incomplete items. Nodes are added in ascending id
/// order so node indices are deterministic.
#[derive(Debug)]
pub struct TriageGraph {
    pub graph: DiGraph<TriageNode, ()>,
    pub node_map: HashMap<String, NodeIndex>,
}

impl TriageGraph {
    /// Build from the item map of a store snapshot.
    #[instrument(skip(items), fields(items = items.len()))]
    pub fn from_items(items: &BTreeMap<String, WorkItem>) -> Self {
        let deps = DependencyGraph::new(items);
        let mut graph = DiGraph::<TriageNode, ()>::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        for item in deps.items().filter(|item| !item.is_completed()) {
            let idx = graph.add_node(TriageNode {
                id: item.id().to_string(),
                weight: item.weight(),
                priority: item.priority,
            });
            node_map.insert(item.id().to_string(), idx);
        }

        for item in deps.items().filter(|item| !item.is_completed()) {
            let Some(&blocked) = node_map.get(item.id()) else {
                continue;
            };
            for dep in deps.dependencies_of(item.id()) {
                if let Some(&blocker) = node_map.get(dep) {
                    graph.add_edge(blocker, blocked, ());
                }
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "triage graph built"
        );
        Self { graph, node_map }
    }

    /// Return the number of nodes (incomplete items) in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of blocking edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up the `NodeIndex` for an item ID.
    #[must_use]
    pub fn node_index(&self, item_id: &str) -> Option<NodeIndex> {
        self.node_map.get(item_id).copied()
    }

    /// Return the item ID label for a node.
    #[must_use]
    pub fn item_id(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(|n| n.id.as_str())
    }
}
