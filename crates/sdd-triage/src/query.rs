//! Read-only views over the dependency graph.

use std::collections::BTreeMap;

use sdd_core::graph::deps::{DependencyGraph, Neighborhood};
use sdd_core::model::{Priority, Status, WorkItem};
use sdd_core::Result;
use serde::Serialize;

use crate::graph::{
    build::TriageGraph,
    critical_path::{CriticalPathResult, compute_critical_path},
};
use crate::metrics::bottleneck::{Bottleneck, bottlenecks};
use crate::schedule::{ItemFilter, RankedItem, rank};

/// Which projection of the graph to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphView {
    /// Every matching item with its edges, in topological order.
    All,
    /// Ready items in recommendation order.
    Ready,
    /// The critical path over all incomplete items. Ignores the filter.
    CriticalPath,
    Bottlenecks,
    /// Direct dependencies and dependents of one item.
    Focus(String),
}

/// An item as it appears in the [`GraphView::All`] view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub status: Status,
    pub priority: Priority,
    pub ready: bool,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum GraphQueryResult {
    All { nodes: Vec<GraphNode> },
    Ready { items: Vec<RankedItem> },
    CriticalPath(CriticalPathResult),
    Bottlenecks { bottlenecks: Vec<Bottleneck> },
    Focus(Neighborhood),
}

/// Evaluate `view` against a snapshot.
///
/// # Errors
///
/// [`sdd_core::SddError::NotFound`] when a focus id is unknown.
pub fn graph_query(
    items: &BTreeMap<String, WorkItem>,
    filter: &ItemFilter,
    view: &GraphView,
) -> Result<GraphQueryResult> {
    let result = match view {
        GraphView::All => {
            let graph = DependencyGraph::new(items);
            let nodes = graph
                .topological_order()
                .into_iter()
                .filter_map(|id| graph.get(id))
                .filter(|item| filter.matches(item))
                .map(|item| GraphNode {
                    id: item.id().to_string(),
                    status: item.status(),
                    priority: item.priority,
                    ready: graph.is_ready(item.id()),
                    dependencies: item.dependencies().iter().cloned().collect(),
                })
                .collect();
            GraphQueryResult::All { nodes }
        }
        GraphView::Ready => GraphQueryResult::Ready {
            items: rank(items, filter),
        },
        GraphView::CriticalPath => {
            GraphQueryResult::CriticalPath(compute_critical_path(&TriageGraph::from_items(items)))
        }
        GraphView::Bottlenecks => {
            let found = bottlenecks(&TriageGraph::from_items(items))
                .into_iter()
                .filter(|b| items.get(&b.id).is_some_and(|item| filter.matches(item)))
                .collect();
            GraphQueryResult::Bottlenecks { bottlenecks: found }
        }
        GraphView::Focus(id) => GraphQueryResult::Focus(DependencyGraph::new(items).neighborhood(id)?),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sdd_core::graph::deps::insert_item;
    use sdd_core::model::WorkItemType;
    use sdd_core::SddError;
    use std::collections::BTreeSet;

    fn sample() -> BTreeMap<String, WorkItem> {
        let mut items = BTreeMap::new();
        for (id, deps) in [("a", vec![]), ("b", vec!["a"]), ("c", vec!["a"])] {
            let item = WorkItem::new(id, WorkItemType::Bug, id, Priority::Medium, Utc::now());
            let deps: BTreeSet<String> = deps.into_iter().map(str::to_string).collect();
            insert_item(&mut items, item, deps).unwrap();
        }
        items
    }

    #[test]
    fn all_view_is_topological() {
        let items = sample();
        let GraphQueryResult::All { nodes } =
            graph_query(&items, &ItemFilter::default(), &GraphView::All).unwrap()
        else {
            panic!("wrong view");
        };
        assert_eq!(nodes[0].id, "a");
        assert!(nodes[0].ready);
        assert!(!nodes[1].ready);
    }

    #[test]
    fn focus_unknown_id_is_not_found() {
        let err = graph_query(
            &sample(),
            &ItemFilter::default(),
            &GraphView::Focus("zzz".into()),
        )
        .unwrap_err();
        assert!(matches!(err, SddError::NotFound { .. }));
    }

    #[test]
    fn result_serializes_with_view_tag() {
        let items = sample();
        let result = graph_query(&items, &ItemFilter::default(), &GraphView::Bottlenecks).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["view"], "bottlenecks");
        assert_eq!(json["bottlenecks"][0]["id"], "a");
        assert_eq!(json["bottlenecks"][0]["score"], 2);
    }
}
