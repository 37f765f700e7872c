//! Dependency graph built from a snapshot of work items.
//!
//! # Overview
//!
//! Edges point from an item to the items it depends on. [`DependencyGraph`]
//! borrows the item map and adds a reverse index so both directions are cheap.
//! It is immutable: rebuild it after any mutation.
//!
//! The free functions at the bottom are the only way dependency sets change.
//! Each one validates against the current map (unknown ids, cycles) before
//! touching it, so the stored graph stays consistent and acyclic.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cycles::detect_cycle_on_add;
use crate::error::{Result, SddError};
use crate::model::item::{Status, WorkItem};

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Read-only dependency view over a work-item map.
#[derive(Debug, Clone)]
pub struct DependencyGraph<'g> {
    items: &'g BTreeMap<String, WorkItem>,
    /// item_id → ids of items that depend on it.
    dependents: BTreeMap<&'g str, BTreeSet<&'g str>>,
}

impl<'g> DependencyGraph<'g> {
    pub fn new(items: &'g BTreeMap<String, WorkItem>) -> Self {
        let mut dependents: BTreeMap<&'g str, BTreeSet<&'g str>> = BTreeMap::new();
        for (id, item) in items {
            for dep in &item.dependencies {
                dependents.entry(dep.as_str()).or_default().insert(id.as_str());
            }
        }
        Self { items, dependents }
    }

    pub fn get(&self, id: &str) -> Option<&'g WorkItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// All item ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &'g str> + use<'g> {
        let items = self.items;
        items.keys().map(String::as_str)
    }

    pub fn items(&self) -> impl Iterator<Item = &'g WorkItem> + use<'g> {
        let items = self.items;
        items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Direct dependencies of `id`, ascending. Empty for unknown ids.
    pub fn dependencies_of(&self, id: &str) -> impl Iterator<Item = &'g str> + use<'g> {
        let items = self.items;
        items
            .get(id)
            .into_iter()
            .flat_map(|item| item.dependencies.iter().map(String::as_str))
    }

    /// Direct dependents of `id` (items that list it as a dependency), ascending.
    pub fn dependents_of(&self, id: &str) -> Vec<&'g str> {
        self.dependents
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of incomplete items that directly depend on `id`.
    pub fn incomplete_dependent_count(&self, id: &str) -> usize {
        self.dependents.get(id).map_or(0, |set| {
            set.iter()
                .filter(|d| self.get(d).is_some_and(|item| !item.is_completed()))
                .count()
        })
    }

    /// Ready iff `not_started` and every dependency is `completed`.
    pub fn is_ready(&self, id: &str) -> bool {
        self.get(id).is_some_and(|item| {
            item.status == Status::NotStarted && self.unmet_dependencies(id).is_empty()
        })
    }

    /// Dependencies of `id` that are not yet `completed`.
    pub fn unmet_dependencies(&self, id: &str) -> Vec<&'g str> {
        self.dependencies_of(id)
            .filter(|dep| !self.get(dep).is_some_and(WorkItem::is_completed))
            .collect()
    }

    /// All ready items in id order.
    pub fn ready_items(&self) -> Vec<&'g WorkItem> {
        self.items
            .values()
            .filter(|item| self.is_ready(&item.id))
            .collect()
    }

    /// Kahn's algorithm with ties broken by ascending id. Dependencies come
    /// before their dependents.
    ///
    /// Items on a cycle are omitted; the store never persists one.
    pub fn topological_order(&self) -> Vec<&'g str> {
        let mut in_degree: BTreeMap<&'g str, usize> = self
            .items
            .iter()
            .map(|(id, item)| {
                let known = item
                    .dependencies
                    .iter()
                    .filter(|d| self.contains(d))
                    .count();
                (id.as_str(), known)
            })
            .collect();

        let mut queue: BinaryHeap<Reverse<&'g str>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(self.items.len());
        while let Some(Reverse(id)) = queue.pop() {
            order.push(id);
            for dependent in self.dependents_of(id) {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(Reverse(dependent));
                    }
                }
            }
        }
        order
    }

    /// Direct dependencies and dependents of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SddError::NotFound`] if `id` is unknown.
    pub fn neighborhood(&self, id: &str) -> Result<Neighborhood> {
        if !self.contains(id) {
            return Err(SddError::not_found(id));
        }
        Ok(Neighborhood {
            id: id.to_string(),
            dependencies: self.dependencies_of(id).map(str::to_string).collect(),
            dependents: self
                .dependents_of(id)
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Result of [`DependencyGraph::neighborhood`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighborhood {
    pub id: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

// ---------------------------------------------------------------------------
// Validated mutations
// ---------------------------------------------------------------------------

/// What to do with items that still depend on an item being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePolicy {
    /// Fail with [`SddError::DanglingReferences`].
    #[default]
    Refuse,
    /// Remove the reference from every dependent, then delete.
    Detach,
}

/// Check a dependency set for a new or existing item.
///
/// # Errors
///
/// [`SddError::DependencyCycle`] for a self-dependency and
/// [`SddError::DependencyNotFound`] for unknown ids.
pub fn validate_dependencies(
    items: &BTreeMap<String, WorkItem>,
    item_id: &str,
    dependencies: &BTreeSet<String>,
) -> Result<()> {
    if dependencies.contains(item_id) {
        let graph = DependencyGraph::new(items);
        if let Some(cycle) = detect_cycle_on_add(&graph, item_id, item_id) {
            return Err(SddError::DependencyCycle(cycle));
        }
    }

    let missing: Vec<String> = dependencies
        .iter()
        .filter(|d| !items.contains_key(d.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SddError::DependencyNotFound {
            item_id: item_id.to_string(),
            missing,
        });
    }
    Ok(())
}

/// Insert a freshly created item with its initial dependencies.
///
/// # Errors
///
/// Fails if the id is already taken or a dependency is invalid.
pub fn insert_item(
    items: &mut BTreeMap<String, WorkItem>,
    mut item: WorkItem,
    dependencies: BTreeSet<String>,
) -> Result<()> {
    if items.contains_key(&item.id) {
        return Err(SddError::validation(
            "id",
            format!("'{}' already exists", item.id),
        ));
    }
    validate_dependencies(items, &item.id, &dependencies)?;
    item.dependencies = dependencies;
    tracing::debug!(id = %item.id, deps = item.dependencies.len(), "item inserted");
    items.insert(item.id.clone(), item);
    Ok(())
}

/// Make `id` depend on `dependency`. Returns `false` if it already did.
///
/// # Errors
///
/// [`SddError::NotFound`] if `id` is unknown, otherwise the errors of
/// [`validate_dependencies`], or [`SddError::DependencyCycle`] if the edge
/// would close a cycle. The map is untouched on error.
pub fn add_dependency(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    dependency: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    if !items.contains_key(id) {
        return Err(SddError::not_found(id));
    }
    let single = BTreeSet::from([dependency.to_string()]);
    validate_dependencies(items, id, &single)?;

    if items.get(id).is_some_and(|item| item.dependencies.contains(dependency)) {
        return Ok(false);
    }

    if let Some(cycle) = detect_cycle_on_add(&DependencyGraph::new(items), id, dependency) {
        return Err(SddError::DependencyCycle(cycle));
    }

    let item = items.get_mut(id).ok_or_else(|| SddError::not_found(id))?;
    item.dependencies.insert(dependency.to_string());
    item.updated_at = now;
    tracing::info!(id, dependency, "dependency added");
    Ok(true)
}

/// Drop `dependency` from `id`. Returns `false` if it was not present.
///
/// # Errors
///
/// [`SddError::NotFound`] if `id` is unknown.
pub fn remove_dependency(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    dependency: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let item = items.get_mut(id).ok_or_else(|| SddError::not_found(id))?;
    let removed = item.dependencies.remove(dependency);
    if removed {
        item.updated_at = now;
        tracing::info!(id, dependency, "dependency removed");
    }
    Ok(removed)
}

/// An item removed by [`remove_item`].
#[derive(Debug, Clone, Serialize)]
pub struct RemovedItem {
    pub item: WorkItem,
    /// Items whose reference to the removed item was detached.
    pub detached_from: Vec<String>,
}

/// Delete `id`, applying `policy` to items that still depend on it.
///
/// # Errors
///
/// [`SddError::NotFound`] if `id` is unknown, and
/// [`SddError::DanglingReferences`] under [`CascadePolicy::Refuse`] when any
/// item still depends on it.
pub fn remove_item(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    policy: CascadePolicy,
    now: DateTime<Utc>,
) -> Result<RemovedItem> {
    if !items.contains_key(id) {
        return Err(SddError::not_found(id));
    }
    let dependents: Vec<String> = DependencyGraph::new(items)
        .dependents_of(id)
        .into_iter()
        .map(str::to_string)
        .collect();

    if !dependents.is_empty() && policy == CascadePolicy::Refuse {
        return Err(SddError::DanglingReferences {
            id: id.to_string(),
            dependents,
        });
    }

    for dependent in &dependents {
        if let Some(item) = items.get_mut(dependent) {
            item.dependencies.remove(id);
            item.updated_at = now;
        }
    }
    let item = items.remove(id).ok_or_else(|| SddError::not_found(id))?;
    tracing::info!(id, detached = dependents.len(), "item deleted");
    Ok(RemovedItem {
        item,
        detached_from: dependents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{Priority, WorkItemType};

    fn add(items: &mut BTreeMap<String, WorkItem>, id: &str, deps: &[&str]) {
        let item = WorkItem::new(id, WorkItemType::Feature, id, Priority::Medium, Utc::now());
        let deps = deps.iter().map(|d| (*d).to_string()).collect();
        insert_item(items, item, deps).unwrap();
    }

    fn complete(items: &mut BTreeMap<String, WorkItem>, id: &str) {
        items.get_mut(id).unwrap().status = Status::Completed;
    }

    #[test]
    fn readiness_requires_completed_dependencies() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        add(&mut items, "b", &["a"]);
        let graph = DependencyGraph::new(&items);
        assert!(graph.is_ready("a"));
        assert!(!graph.is_ready("b"));
        assert_eq!(graph.unmet_dependencies("b"), vec!["a"]);

        complete(&mut items, "a");
        let graph = DependencyGraph::new(&items);
        assert!(!graph.is_ready("a"));
        assert!(graph.is_ready("b"));
    }

    #[test]
    fn blocked_and_in_progress_items_are_not_ready() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        add(&mut items, "b", &[]);
        items.get_mut("a").unwrap().status = Status::Blocked;
        items.get_mut("b").unwrap().status = Status::InProgress;
        assert!(DependencyGraph::new(&items).ready_items().is_empty());
    }

    #[test]
    fn topological_order_breaks_ties_by_id() {
        let mut items = BTreeMap::new();
        add(&mut items, "c", &[]);
        add(&mut items, "a", &[]);
        add(&mut items, "d", &["c", "a"]);
        add(&mut items, "b", &["d"]);
        let order = DependencyGraph::new(&items).topological_order();
        assert_eq!(order, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn neighborhood_lists_both_directions() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        add(&mut items, "b", &["a"]);
        add(&mut items, "c", &["b"]);
        let n = DependencyGraph::new(&items).neighborhood("b").unwrap();
        assert_eq!(n.dependencies, vec!["a"]);
        assert_eq!(n.dependents, vec!["c"]);
        assert!(matches!(
            DependencyGraph::new(&items).neighborhood("zzz"),
            Err(SddError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected_at_creation() {
        let mut items = BTreeMap::new();
        let item = WorkItem::new("a", WorkItemType::Bug, "a", Priority::Low, Utc::now());
        let err = insert_item(&mut items, item, BTreeSet::from(["ghost".to_string()]))
            .unwrap_err();
        assert!(matches!(err, SddError::DependencyNotFound { ref missing, .. } if missing == &["ghost"]));
        assert!(items.is_empty());
    }

    #[test]
    fn cycle_is_rejected_and_sets_unchanged() {
        let mut items = BTreeMap::new();
        add(&mut items, "d", &[]);
        add(&mut items, "e", &[]);
        assert!(add_dependency(&mut items, "d", "e", Utc::now()).unwrap());

        let before = items.clone();
        let err = add_dependency(&mut items, "e", "d", Utc::now()).unwrap_err();
        assert!(matches!(err, SddError::DependencyCycle(_)));
        assert_eq!(items, before);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        let err = add_dependency(&mut items, "a", "a", Utc::now()).unwrap_err();
        assert!(matches!(err, SddError::DependencyCycle(ref c) if c.is_self_loop()));
    }

    #[test]
    fn adding_existing_dependency_is_a_noop() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        add(&mut items, "b", &["a"]);
        assert!(!add_dependency(&mut items, "b", "a", Utc::now()).unwrap());
        assert!(remove_dependency(&mut items, "b", "a", Utc::now()).unwrap());
        assert!(!remove_dependency(&mut items, "b", "a", Utc::now()).unwrap());
    }

    #[test]
    fn delete_refuses_while_referenced() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        add(&mut items, "b", &["a"]);
        add(&mut items, "c", &["a"]);

        let err = remove_item(&mut items, "a", CascadePolicy::Refuse, Utc::now()).unwrap_err();
        assert!(
            matches!(err, SddError::DanglingReferences { ref dependents, .. } if dependents == &["b", "c"])
        );
        assert_eq!(items.len(), 3);

        let removed = remove_item(&mut items, "a", CascadePolicy::Detach, Utc::now()).unwrap();
        assert_eq!(removed.detached_from, vec!["b", "c"]);
        assert!(items["b"].dependencies.is_empty());
        assert!(!items.contains_key("a"));
    }

    #[test]
    fn incomplete_dependents_ignore_completed_ones() {
        let mut items = BTreeMap::new();
        add(&mut items, "a", &[]);
        add(&mut items, "b", &["a"]);
        add(&mut items, "c", &["a"]);
        complete(&mut items, "a");
        complete(&mut items, "b");
        let graph = DependencyGraph::new(&items);
        assert_eq!(graph.dependents_of("a"), vec!["b", "c"]);
        assert_eq!(graph.incomplete_dependent_count("a"), 1);
    }
}
