//! Next-item recommendation.
//!
//! Candidates are ready items that match an optional [`ItemFilter`]. They are
//! ranked by:
//!
//! 1. priority, highest first
//! 2. items on the critical path first
//! 3. bottleneck score (direct incomplete dependents), highest first
//! 4. id, ascending
//!
//! Analytics are recomputed from the snapshot on every call.

#![allow(clippy::module_name_repetitions)]

use std::cmp::Reverse;
use std::collections::BTreeMap;

use sdd_core::graph::deps::DependencyGraph;
use sdd_core::model::{Priority, Status, WorkItem, WorkItemType};
use serde::Serialize;
use tracing::instrument;

use crate::graph::{build::TriageGraph, critical_path::compute_critical_path};
use crate::metrics::bottleneck::blocking_scores;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Optional constraints on which items are considered. Empty fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub status: Option<Status>,
    pub item_type: Option<WorkItemType>,
    pub milestone: Option<String>,
    pub priority: Option<Priority>,
}

impl ItemFilter {
    #[must_use]
    pub fn matches(&self, item: &WorkItem) -> bool {
        self.status.is_none_or(|s| item.status() == s)
            && self.item_type.is_none_or(|t| item.item_type == t)
            && self
                .milestone
                .as_deref()
                .is_none_or(|m| item.milestone.as_deref() == Some(m))
            && self.priority.is_none_or(|p| item.priority == p)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// A ready item with the factors that placed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedItem {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub on_critical_path: bool,
    pub bottleneck_score: usize,
    /// Weighted length of the longest incomplete chain ending at the item.
    pub chain_length: u64,
}

impl RankedItem {
    fn sort_key(&self) -> (Reverse<Priority>, bool, Reverse<usize>, &str) {
        (
            Reverse(self.priority),
            !self.on_critical_path,
            Reverse(self.bottleneck_score),
            self.id.as_str(),
        )
    }
}

/// All ready items matching `filter`, best first.
#[must_use]
#[instrument(skip_all, fields(items = items.len()))]
pub fn rank(items: &BTreeMap<String, WorkItem>, filter: &ItemFilter) -> Vec<RankedItem> {
    let deps = DependencyGraph::new(items);
    let tg = TriageGraph::from_items(items);
    let critical = compute_critical_path(&tg);
    let scores = blocking_scores(&tg);

    let mut ranked: Vec<RankedItem> = deps
        .ready_items()
        .into_iter()
        .filter(|item| filter.matches(item))
        .map(|item| RankedItem {
            id: item.id().to_string(),
            title: item.title.clone(),
            priority: item.priority,
            on_critical_path: critical.is_critical(item.id()),
            bottleneck_score: scores.get(item.id()).copied().unwrap_or(0),
            chain_length: critical.chain_length(item.id()),
        })
        .collect();

    ranked.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    tracing::debug!(candidates = ranked.len(), "ready items ranked");
    ranked
}

/// The single best candidate, or `None` when nothing is ready.
#[must_use]
pub fn recommend(items: &BTreeMap<String, WorkItem>, filter: &ItemFilter) -> Option<RankedItem> {
    rank(items, filter).into_iter().next()
}
