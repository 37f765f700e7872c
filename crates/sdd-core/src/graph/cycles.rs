//! Cycle detection for the dependency graph.
//!
//! # Overview
//!
//! Dependencies form a directed graph (`item → dependency`). A cycle would
//! leave every item on it permanently unready, so a dependency mutation that
//! closes one is rejected before anything is written.
//!
//! # Design
//!
//! - **DFS-based**: depth-first search from the target of the new edge,
//!   looking for a path back to the source. This finds the cycle that the new
//!   edge closes.
//! - **O(V+E)**: each detection check visits each node and edge at most once.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sdd_core::graph::cycles::detect_cycle_on_add;
//! use sdd_core::graph::deps::DependencyGraph;
//!
//! let graph = DependencyGraph::new(&items);
//! if let Some(cycle) = detect_cycle_on_add(&graph, "feature_a", "bug_b") {
//!     return Err(SddError::DependencyCycle(cycle));
//! }
//! ```

#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::deps::DependencyGraph;

// ---------------------------------------------------------------------------
// CycleWarning
// ---------------------------------------------------------------------------

/// A dependency edge that would close a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWarning {
    /// The ordered list of item IDs forming the cycle.
    ///
    /// The path starts at the source of the new edge, follows dependencies,
    /// and ends at the source again. Adding `A → B` when `B → C → A` already
    /// exists gives `["A", "B", "C", "A"]`.
    pub cycle_path: Vec<String>,

    /// The item gaining the dependency.
    pub edge_from: String,

    /// The dependency being added.
    pub edge_to: String,
}

impl CycleWarning {
    /// Number of distinct items in the cycle (path length minus the repeated
    /// start node).
    pub fn cycle_len(&self) -> usize {
        self.cycle_path.len().saturating_sub(1)
    }

    /// Returns `true` if the item would depend on itself.
    pub fn is_self_loop(&self) -> bool {
        self.edge_from == self.edge_to
    }
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            write!(
                f,
                "dependency cycle: '{}' cannot depend on itself",
                self.edge_from
            )
        } else {
            write!(f, "dependency cycle: {}", self.cycle_path.join(" → "))
        }
    }
}

// ---------------------------------------------------------------------------
// Core detection
// ---------------------------------------------------------------------------

/// Detect whether adding the edge `from → to` (`from` depends on `to`) would
/// create a cycle.
///
/// Checks whether `from` is already reachable from `to` by following
/// dependencies. Returns the cycle if so.
pub fn detect_cycle_on_add(graph: &DependencyGraph<'_>, from: &str, to: &str) -> Option<CycleWarning> {
    if from == to {
        return Some(CycleWarning {
            cycle_path: vec![from.to_string(), from.to_string()],
            edge_from: from.to_string(),
            edge_to: to.to_string(),
        });
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut parent_map: HashMap<String, String> = HashMap::new();

    if dfs_find_path(graph, to, from, &mut visited, &mut parent_map) {
        let mut path = vec![from.to_string()];
        reconstruct_path(&parent_map, to, from, &mut path);
        tracing::debug!(path = ?path, "dependency edge rejected");

        Some(CycleWarning {
            cycle_path: path,
            edge_from: from.to_string(),
            edge_to: to.to_string(),
        })
    } else {
        None
    }
}

/// Find any cycle already present in the graph.
///
/// Used when loading a store that was edited by hand.
pub fn find_cycle(graph: &DependencyGraph<'_>) -> Option<CycleWarning> {
    let mut color: HashMap<&str, Color> = HashMap::new();
    let mut parent_map: HashMap<String, String> = HashMap::new();

    for item in graph.ids() {
        if color.get(item).is_none() {
            if let Some(found) = dfs_back_edge(graph, item, &mut color, &mut parent_map) {
                return Some(found);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// DFS internals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the DFS stack.
    Gray,
    /// Fully processed.
    Black,
}

fn dfs_find_path(
    graph: &DependencyGraph<'_>,
    current: &str,
    target: &str,
    visited: &mut HashSet<String>,
    parent_map: &mut HashMap<String, String>,
) -> bool {
    if current == target {
        return true;
    }

    if !visited.insert(current.to_string()) {
        return false;
    }

    for neighbor in graph.dependencies_of(current) {
        if !visited.contains(neighbor) {
            parent_map.insert(neighbor.to_string(), current.to_string());
            if dfs_find_path(graph, neighbor, target, visited, parent_map) {
                return true;
            }
        }
    }

    false
}

/// Append the path `start → … → end` recorded in `parent_map` to `path`.
fn reconstruct_path(
    parent_map: &HashMap<String, String>,
    start: &str,
    end: &str,
    path: &mut Vec<String>,
) {
    let mut chain = Vec::new();
    let mut current = end.to_string();

    while current != start {
        chain.push(current.clone());
        match parent_map.get(&current) {
            Some(parent) => current.clone_from(parent),
            None => break,
        }
    }

    chain.push(start.to_string());
    chain.reverse();

    let skip = usize::from(path.last().map(String::as_str) == Some(start));
    path.extend(chain.into_iter().skip(skip));
}

fn dfs_back_edge<'g>(
    graph: &DependencyGraph<'g>,
    node: &'g str,
    color: &mut HashMap<&'g str, Color>,
    parent_map: &mut HashMap<String, String>,
) -> Option<CycleWarning> {
    color.insert(node, Color::Gray);

    for neighbor in graph.dependencies_of(node) {
        match color.get(neighbor) {
            None => {
                parent_map.insert(neighbor.to_string(), node.to_string());
                if let Some(found) = dfs_back_edge(graph, neighbor, color, parent_map) {
                    return Some(found);
                }
            }
            Some(Color::Gray) => {
                // Back edge node → neighbor closes neighbor → … → node → neighbor.
                let mut chain = vec![node.to_string()];
                let mut cur = node.to_string();
                while cur != neighbor {
                    match parent_map.get(&cur) {
                        Some(p) => {
                            cur.clone_from(p);
                            chain.push(cur.clone());
                        }
                        None => break,
                    }
                }
                chain.reverse();
                chain.push(neighbor.to_string());
                return Some(CycleWarning {
                    cycle_path: chain,
                    edge_from: node.to_string(),
                    edge_to: neighbor.to_string(),
                });
            }
            Some(Color::Black) => {}
        }
    }

    color.insert(node, Color::Black);
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
