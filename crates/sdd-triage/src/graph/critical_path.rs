//! Critical path analysis for the dependency graph.
//!
//! # Overview
//!
//! The critical path is the *longest* chain of incomplete dependencies in the
//! project. Items on it have **zero slack**: any delay on them delays the
//! earliest possible completion of the whole project.
//!
//! # Definitions
//!
//! Each item contributes its weight (its estimate, or 1).
//!
//! | Term              | Definition |
//! |-------------------|------------|
//! | `earliest_start`  | Earliest point at which an item can begin (all blockers done). |
//! | `earliest_finish` | `earliest_start + weight`; also the longest chain ending at the item. |
//! | `latest_finish`   | Latest finish that does not delay the project. |
//! | `latest_start`    | `latest_finish - weight`. |
//! | `slack`           | `latest_start - earliest_start`, zero on the critical path. |
//!
//! # Algorithm
//!
//! 1. **Forward pass** in topological order: `earliest_finish`.
//! 2. **Backward pass** in reverse topological order: `latest_finish`.
//! 3. **Slack** = `latest_finish − earliest_finish`. Zero slack means critical.
//! 4. **Path reconstruction**: from the zero-slack sink with the greatest
//!    `earliest_finish`, walk back through zero-slack blockers whose finish
//!    equals the current start. Ties go to the smallest id.
//!
//! Results are recomputed from the snapshot on every call.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::{Direction, algo::toposort, graph::NodeIndex, visit::EdgeRef};
use serde::Serialize;

use super::build::TriageGraph;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Per-item timing computed during critical path analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemTiming {
    pub earliest_start: u64,
    pub earliest_finish: u64,
    pub latest_start: u64,
    pub latest_finish: u64,
    /// Total float. Zero for items on the critical path.
    pub slack: u64,
}

impl ItemTiming {
    /// Weighted length of the longest incomplete chain ending at this item.
    #[must_use]
    pub const fn chain_length(&self) -> u64 {
        self.earliest_finish
    }
}

/// Result of critical path analysis on a dependency graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CriticalPathResult {
    /// Item IDs on one maximum chain, blockers first.
    pub critical_path: Vec<String>,
    /// All item IDs with zero slack (every item on any maximum chain).
    pub critical_items: BTreeSet<String>,
    /// Per-item timing information.
    pub item_timings: BTreeMap<String, ItemTiming>,
    /// Weighted length of the critical path.
    pub total_length: u64,
}

impl CriticalPathResult {
    /// Return `true` if the graph had no incomplete items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.critical_path.is_empty()
    }

    #[must_use]
    pub fn is_critical(&self, id: &str) -> bool {
        self.critical_items.contains(id)
    }

    #[must_use]
    pub fn chain_length(&self, id: &str) -> u64 {
        self.item_timings.get(id).map_or(0, ItemTiming::chain_length)
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Compute the critical path over `tg`.
#[must_use]
pub fn compute_critical_path(tg: &TriageGraph) -> CriticalPathResult {
    let graph = &tg.graph;
    if graph.node_count() == 0 {
        return CriticalPathResult::default();
    }

    // The store keeps the graph acyclic; fall back to index order if not.
    let topo: Vec<NodeIndex> = toposort(graph, None).unwrap_or_else(|cycle| {
        tracing::warn!(node = ?cycle.node_id(), "cycle in triage graph");
        graph.node_indices().collect()
    });

    let weight = |v: NodeIndex| graph.node_weight(v).map_or(1, |n| n.weight);
    let id = |v: NodeIndex| graph.node_weight(v).map_or("", |n| n.id.as_str());

    // --- Forward pass ---
    let mut earliest_finish: HashMap<NodeIndex, u64> = HashMap::with_capacity(topo.len());
    for &v in &topo {
        let max_pred_finish = graph
            .edges_directed(v, Direction::Incoming)
            .map(|e| earliest_finish.get(&e.source()).copied().unwrap_or(0))
            .max()
            .unwrap_or(0);
        earliest_finish.insert(v, max_pred_finish + weight(v));
    }

    let project_finish = earliest_finish.values().copied().max().unwrap_or(0);

    // --- Backward pass ---
    let mut latest_finish: HashMap<NodeIndex, u64> = HashMap::with_capacity(topo.len());
    for &v in topo.iter().rev() {
        let min_succ_start = graph
            .edges_directed(v, Direction::Outgoing)
            .map(|e| {
                let succ = e.target();
                let lf = latest_finish.get(&succ).copied().unwrap_or(project_finish);
                lf.saturating_sub(weight(succ))
            })
            .min()
            .unwrap_or(project_finish);
        latest_finish.insert(v, min_succ_start);
    }

    // --- Timings ---
    let mut item_timings = BTreeMap::new();
    let mut critical_items = BTreeSet::new();
    let mut node_slack: HashMap<NodeIndex, u64> = HashMap::with_capacity(topo.len());

    for &v in &topo {
        let ef = earliest_finish[&v];
        let lf = latest_finish[&v];
        let w = weight(v);
        let slack = lf.saturating_sub(ef);
        node_slack.insert(v, slack);

        let timing = ItemTiming {
            earliest_start: ef - w,
            earliest_finish: ef,
            latest_start: lf.saturating_sub(w),
            latest_finish: lf,
            slack,
        };
        if slack == 0 {
            critical_items.insert(id(v).to_string());
        }
        item_timings.insert(id(v).to_string(), timing);
    }

    let path = reconstruct_critical_path(tg, &topo, &earliest_finish, &node_slack);
    let critical_path: Vec<String> = path.iter().map(|&v| id(v).to_string()).collect();

    tracing::debug!(
        length = project_finish,
        path_items = critical_path.len(),
        critical = critical_items.len(),
        "critical path computed"
    );

    CriticalPathResult {
        critical_path,
        critical_items,
        item_timings,
        total_length: project_finish,
    }
}

// ---------------------------------------------------------------------------
// Path reconstruction helper
// ---------------------------------------------------------------------------

fn reconstruct_critical_path(
    tg: &TriageGraph,
    topo: &[NodeIndex],
    earliest_finish: &HashMap<NodeIndex, u64>,
    node_slack: &HashMap<NodeIndex, u64>,
) -> Vec<NodeIndex> {
    let graph = &tg.graph;
    let zero_slack = |v: &NodeIndex| node_slack.get(v).copied().unwrap_or(1) == 0;
    let ef = |v: NodeIndex| earliest_finish.get(&v).copied().unwrap_or(0);
    let id = |v: NodeIndex| tg.item_id(v).unwrap_or("");

    // Sink: greatest finish, smallest id on ties.
    let Some(&sink) = topo
        .iter()
        .filter(|v| zero_slack(v))
        .max_by(|&&a, &&b| ef(a).cmp(&ef(b)).then_with(|| id(b).cmp(id(a))))
    else {
        return Vec::new();
    };

    let mut path: Vec<NodeIndex> = vec![sink];
    let mut current = sink;

    loop {
        let start = ef(current) - graph.node_weight(current).map_or(1, |n| n.weight);
        let prev = graph
            .edges_directed(current, Direction::Incoming)
            .map(|e| e.source())
            .filter(|p| zero_slack(p) && ef(*p) == start)
            .min_by(|&a, &b| id(a).cmp(id(b)));

        match prev {
            Some(p) => {
                current = p;
                path.push(current);
            }
            None => break,
        }
    }

    path.reverse();
    path
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
