//! Bottleneck ranking by direct blocking fan-out.
//!
//! # Overview
//!
//! An item's bottleneck score is the number of incomplete items that list it
//! as a direct dependency, i.e. its out-degree in the [`TriageGraph`].
//! Items that block at least [`MIN_BOTTLENECK_SCORE`] others are reported.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use petgraph::{Direction, visit::IntoNodeIdentifiers};
use sdd_core::model::Priority;
use serde::Serialize;

use crate::graph::build::TriageGraph;

/// Scores below this are not bottlenecks.
pub const MIN_BOTTLENECK_SCORE: usize = 2;

/// An incomplete item that directly blocks several others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub id: String,
    pub score: usize,
    pub priority: Priority,
    /// The blocked items, ascending.
    pub dependents: Vec<String>,
}

/// Direct incomplete-dependent count for every node, keyed by id.
#[must_use]
pub fn blocking_scores(tg: &TriageGraph) -> BTreeMap<String, usize> {
    tg.graph
        .node_identifiers()
        .filter_map(|idx| {
            let id = tg.item_id(idx)?;
            let out = tg
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .count();
            Some((id.to_string(), out))
        })
        .collect()
}

/// Items with score ≥ [`MIN_BOTTLENECK_SCORE`], sorted by score desc, then
/// priority desc, then id asc.
#[must_use]
pub fn bottlenecks(tg: &TriageGraph) -> Vec<Bottleneck> {
    let mut found: Vec<Bottleneck> = tg
        .graph
        .node_identifiers()
        .filter_map(|idx| {
            let node = tg.graph.node_weight(idx)?;
            let mut dependents: Vec<String> = tg
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .filter_map(|n| tg.item_id(n).map(str::to_string))
                .collect();
            if dependents.len() < MIN_BOTTLENECK_SCORE {
                return None;
            }
            dependents.sort_unstable();
            Some(Bottleneck {
                id: node.id.clone(),
                score: dependents.len(),
                priority: node.priority,
                dependents,
            })
        })
        .collect();

    found.sort_by(|a, b| {
        (Reverse(a.score), Reverse(a.priority), &a.id).cmp(&(
            Reverse(b.score),
            Reverse(b.priority),
            &b.id,
        ))
    });
    tracing::debug!(count = found.len(), "bottlenecks ranked");
    found
}
