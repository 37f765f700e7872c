//! Session orchestration over a [`WorkItemStore`].
//!
//! [`SessionOrchestrator`] is the command surface: every read takes a fresh
//! snapshot, and every write runs one validated mutation under the store
//! lock. Ending a session runs the configured check commands *outside* the
//! lock, evaluates the quality gate, then applies the lifecycle and branch
//! transitions in a single write.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use sdd_core::config::{ProjectConfig, load_project_config};
use sdd_core::gate::{
    self, Signals, Verdict,
    runner::{CheckRun, merge_signals, run_checks},
};
use sdd_core::graph::deps::{self, CascadePolicy, DependencyGraph, RemovedItem};
use sdd_core::lifecycle::{
    self, BranchUpdate, SessionEnded, SessionStarted, branch::GitFacts,
};
use sdd_core::model::{
    BlockInfo, Priority, Status, StoreMetadata, WorkItem, WorkItemType, generate_id,
};
use sdd_core::{Result, SddError, WorkItemStore};
use serde::Serialize;
use tracing::instrument;

use crate::graph::{build::TriageGraph, critical_path::compute_critical_path};
use crate::query::{GraphQueryResult, GraphView, graph_query};
use crate::schedule::{ItemFilter, RankedItem, rank};

// ---------------------------------------------------------------------------
// Inputs and results
// ---------------------------------------------------------------------------

/// Fields for a new work item. The id is generated from type and title.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub item_type: WorkItemType,
    pub title: String,
    pub priority: Priority,
    pub dependencies: BTreeSet<String>,
    pub description: Option<String>,
    pub milestone: Option<String>,
    pub estimate: Option<u32>,
    pub acceptance_criteria: Vec<String>,
}

impl NewItem {
    #[must_use]
    pub fn new(item_type: WorkItemType, title: impl Into<String>) -> Self {
        Self {
            item_type,
            title: title.into(),
            priority: Priority::default(),
            dependencies: BTreeSet::new(),
            description: None,
            milestone: None,
            estimate: None,
            acceptance_criteria: Vec::new(),
        }
    }
}

/// Editable descriptive fields. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub milestone: Option<String>,
    pub estimate: Option<u32>,
    pub acceptance_criteria: Option<Vec<String>>,
}

/// An item plus its position in the graph.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: WorkItem,
    pub ready: bool,
    pub unmet_dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

/// Store-wide summary.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    #[serde(flatten)]
    pub metadata: StoreMetadata,
    pub ready: usize,
    pub active: Vec<String>,
    pub critical_path_length: u64,
}

/// Everything that happened at the end of a session.
#[derive(Debug, Clone, Serialize)]
pub struct EndOutcome {
    pub session: SessionEnded,
    pub verdict: Verdict,
    /// Check commands run for this verdict.
    pub checks: Vec<CheckRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchUpdate>,
}

impl EndOutcome {
    #[must_use]
    pub const fn gate_failed(&self) -> bool {
        !self.verdict.passed
    }
}

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionOrchestrator {
    store: WorkItemStore,
    config: ProjectConfig,
    run_commands: bool,
}

impl SessionOrchestrator {
    /// Open the store under `root` with its `.sdd/config.toml`.
    ///
    /// # Errors
    ///
    /// Config parse errors, or [`SddError::NotInitialized`].
    pub fn open(root: &Path) -> Result<Self> {
        let config = load_project_config(root)?;
        let store = WorkItemStore::open(root, config.store.lock_timeout())?;
        Ok(Self::new(store, config))
    }

    #[must_use]
    pub const fn new(store: WorkItemStore, config: ProjectConfig) -> Self {
        Self {
            store,
            config,
            run_commands: true,
        }
    }

    /// Whether [`Self::end`] runs configured check commands.
    #[must_use]
    pub const fn with_check_commands(mut self, run: bool) -> Self {
        self.run_commands = run;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &WorkItemStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    // -- reads --------------------------------------------------------------

    /// Best ready item matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Store load errors.
    pub fn recommend(&self, filter: &ItemFilter) -> Result<Option<RankedItem>> {
        Ok(self.rank(filter)?.into_iter().next())
    }

    /// All ready items matching `filter`, best first.
    ///
    /// # Errors
    ///
    /// Store load errors.
    pub fn rank(&self, filter: &ItemFilter) -> Result<Vec<RankedItem>> {
        let file = self.store.load()?;
        Ok(rank(&file.work_items, filter))
    }

    /// # Errors
    ///
    /// Store load errors, or [`SddError::NotFound`] for an unknown focus id.
    pub fn graph_query(&self, filter: &ItemFilter, view: &GraphView) -> Result<GraphQueryResult> {
        let file = self.store.load()?;
        graph_query(&file.work_items, filter, view)
    }

    /// # Errors
    ///
    /// Store load errors, or [`SddError::NotFound`].
    pub fn show(&self, id: &str) -> Result<ItemDetail> {
        let file = self.store.load()?;
        let graph = DependencyGraph::new(&file.work_items);
        let item = graph.get(id).ok_or_else(|| SddError::not_found(id))?;
        Ok(ItemDetail {
            item: item.clone(),
            ready: graph.is_ready(id),
            unmet_dependencies: graph
                .unmet_dependencies(id)
                .into_iter()
                .map(str::to_string)
                .collect(),
            dependents: graph
                .dependents_of(id)
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Items matching `filter` in id order.
    ///
    /// # Errors
    ///
    /// Store load errors.
    pub fn list(&self, filter: &ItemFilter) -> Result<Vec<WorkItem>> {
        let file = self.store.load()?;
        Ok(file
            .work_items
            .into_values()
            .filter(|item| filter.matches(item))
            .collect())
    }

    /// # Errors
    ///
    /// Store load errors.
    pub fn status(&self) -> Result<StatusSummary> {
        let file = self.store.load()?;
        let graph = DependencyGraph::new(&file.work_items);
        let critical = compute_critical_path(&TriageGraph::from_items(&file.work_items));
        Ok(StatusSummary {
            ready: graph.ready_items().len(),
            active: graph
                .items()
                .filter(|item| item.active_session().is_some())
                .map(|item| item.id().to_string())
                .collect(),
            critical_path_length: critical.total_length,
            metadata: file.metadata,
        })
    }

    // -- sessions -----------------------------------------------------------

    /// Start (or resume) work on `id`.
    ///
    /// # Errors
    ///
    /// [`SddError::InvalidTransition`] if the item is not ready, blocked,
    /// completed, or already has an open session.
    #[instrument(skip(self))]
    pub fn begin(&self, id: &str) -> Result<SessionStarted> {
        self.store
            .mutate(|items, now| lifecycle::begin_session(items, id, now))
    }

    /// End the open session on `id`.
    ///
    /// A failing gate is not an error: inspect [`EndOutcome::verdict`]. Git
    /// facts are applied whatever the verdict.
    ///
    /// # Errors
    ///
    /// Lifecycle errors (no open session, unmet dependencies on completion),
    /// check-runner I/O errors, and store errors.
    #[instrument(skip(self, signals, git_facts), fields(signals = signals.len()))]
    pub fn end(
        &self,
        id: &str,
        signals: &Signals,
        done: Option<bool>,
        git_facts: Option<&GitFacts>,
    ) -> Result<EndOutcome> {
        let snapshot = self.store.load()?;
        lifecycle::open_session(&snapshot.work_items, id)?;

        let checks = if self.run_commands {
            run_checks(&self.config.quality_gates, self.store.root(), signals)?
        } else {
            Vec::new()
        };
        let merged = merge_signals(&checks, signals);
        let verdict = gate::evaluate(&self.config.quality_gates, &merged);
        let workflow = self.config.git.workflow;

        let (session, branch) = self.store.mutate(|items, now| {
            let session = lifecycle::end_session(items, id, &verdict, done, now)?;
            let branch = match git_facts {
                Some(facts) => lifecycle::observe_branch(items, id, facts, workflow, now)?,
                None => None,
            };
            Ok((session, branch))
        })?;

        if verdict.passed {
            for warning in &verdict.warnings {
                tracing::warn!(id, check = %warning.name, reason = %warning.reason, "optional check");
            }
        } else {
            tracing::warn!(id, failing = ?verdict.failing_names(), "quality gate failed");
        }

        Ok(EndOutcome {
            session,
            verdict,
            checks,
            branch,
        })
    }

    /// # Errors
    ///
    /// [`SddError::Validation`] for an empty reason, lifecycle errors.
    #[instrument(skip(self))]
    pub fn mark_blocked(&self, id: &str, reason: &str) -> Result<BlockInfo> {
        self.store
            .mutate(|items, now| lifecycle::mark_blocked(items, id, reason, now))
    }

    /// Returns the status the item resumed to.
    ///
    /// # Errors
    ///
    /// [`SddError::InvalidTransition`] if the item is not blocked.
    #[instrument(skip(self))]
    pub fn clear_block(&self, id: &str) -> Result<Status> {
        self.store
            .mutate(|items, now| lifecycle::clear_block(items, id, now))
    }

    /// # Errors
    ///
    /// [`SddError::Validation`] if the item never had a branch.
    #[instrument(skip(self))]
    pub fn abandon_branch(&self, id: &str) -> Result<BranchUpdate> {
        self.store
            .mutate(|items, now| lifecycle::abandon_branch(items, id, now))
    }

    // -- items --------------------------------------------------------------

    /// Create an item and return it with its generated id.
    ///
    /// # Errors
    ///
    /// [`SddError::Validation`] for an empty title or a zero estimate, and
    /// dependency errors for unknown ids.
    #[instrument(skip(self, new), fields(title = %new.title))]
    pub fn create(&self, new: NewItem) -> Result<WorkItem> {
        let title = validate_title(&new.title)?;
        validate_estimate(new.estimate)?;

        self.store.mutate(|items, now| {
            let id = generate_id(new.item_type, &title, |candidate| {
                items.contains_key(candidate)
            });
            let mut item = WorkItem::new(id.clone(), new.item_type, title, new.priority, now);
            item.description = new.description;
            item.milestone = new.milestone;
            item.estimate = new.estimate;
            item.acceptance_criteria = new.acceptance_criteria;
            deps::insert_item(items, item, new.dependencies)?;
            tracing::info!(id = %id, "item created");
            items.get(&id).cloned().ok_or_else(|| SddError::not_found(&id))
        })
    }

    /// Apply `patch` to the descriptive fields of `id`.
    ///
    /// # Errors
    ///
    /// [`SddError::NotFound`], or [`SddError::Validation`] for an empty
    /// title or a zero estimate.
    #[instrument(skip(self, patch))]
    pub fn update(&self, id: &str, patch: ItemPatch) -> Result<WorkItem> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        validate_estimate(patch.estimate)?;

        self.store.mutate(|items, now| {
            let item = items.get_mut(id).ok_or_else(|| SddError::not_found(id))?;
            let before = item.clone();
            if let Some(title) = title {
                item.title = title;
            }
            if let Some(description) = patch.description {
                item.description = Some(description);
            }
            if let Some(priority) = patch.priority {
                item.priority = priority;
            }
            if let Some(milestone) = patch.milestone {
                item.milestone = Some(milestone);
            }
            if let Some(estimate) = patch.estimate {
                item.estimate = Some(estimate);
            }
            if let Some(criteria) = patch.acceptance_criteria {
                item.acceptance_criteria = criteria;
            }
            if *item != before {
                item.updated_at = now;
                tracing::info!(id, "item updated");
            }
            Ok(item.clone())
        })
    }

    /// # Errors
    ///
    /// [`SddError::NotFound`], or [`SddError::DanglingReferences`] under
    /// [`CascadePolicy::Refuse`].
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str, policy: CascadePolicy) -> Result<RemovedItem> {
        self.store
            .mutate(|items, now| deps::remove_item(items, id, policy, now))
    }

    /// Returns `false` if the dependency already existed.
    ///
    /// # Errors
    ///
    /// [`SddError::DependencyCycle`], [`SddError::DependencyNotFound`], or
    /// [`SddError::NotFound`]. The store is unchanged on error.
    #[instrument(skip(self))]
    pub fn add_dependency(&self, id: &str, dependency: &str) -> Result<bool> {
        self.store
            .mutate(|items, now| deps::add_dependency(items, id, dependency, now))
    }

    /// Returns `false` if there was no such dependency.
    ///
    /// # Errors
    ///
    /// [`SddError::NotFound`].
    #[instrument(skip(self))]
    pub fn remove_dependency(&self, id: &str, dependency: &str) -> Result<bool> {
        self.store
            .mutate(|items, now| deps::remove_dependency(items, id, dependency, now))
    }

    /// Snapshot of every item, keyed by id.
    ///
    /// # Errors
    ///
    /// Store load errors.
    pub fn items(&self) -> Result<BTreeMap<String, WorkItem>> {
        Ok(self.store.load()?.work_items)
    }
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(SddError::validation("title", "title must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_estimate(estimate: Option<u32>) -> Result<()> {
    if estimate == Some(0) {
        return Err(SddError::validation("estimate", "estimate must be positive"));
    }
    Ok(())
}
