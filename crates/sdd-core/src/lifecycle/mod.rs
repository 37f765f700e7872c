//! Work-item lifecycle.
//!
//! ```text
//! not_started ──begin──> in_progress ──end(pass, done)──> completed
//!      │                   │    ▲
//!      │                   │    └── end(pass, not done) / begin (next session)
//!      └──block──> blocked <┘
//!                  │
//!                  └──unblock──> state before the block
//! ```
//!
//! Every function here takes the whole item map because guards look at other
//! items (dependency completion). On error nothing is modified.

pub mod branch;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use self::branch::{BranchStatus, GitFacts, GitWorkflow};
use crate::error::{Result, SddError};
use crate::gate::Verdict;
use crate::graph::deps::DependencyGraph;
use crate::model::item::{BlockInfo, CommitRef, SessionOutcome, SessionRecord, Status, WorkItem};

/// Events accepted by the lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BeginSession,
    EndSession,
    MarkBlocked,
    ClearBlock,
}

impl LifecycleEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeginSession => "begin a session on",
            Self::EndSession => "end a session on",
            Self::MarkBlocked => "block",
            Self::ClearBlock => "unblock",
        }
    }

    /// Whether `from` accepts this event at all, before item-specific guards.
    ///
    /// # Errors
    ///
    /// Returns the reason the status rejects the event.
    pub const fn accepts(self, from: Status) -> std::result::Result<(), &'static str> {
        match (self, from) {
            (_, Status::Completed) => Err("completed is terminal"),
            (Self::BeginSession, Status::NotStarted | Status::InProgress)
            | (Self::EndSession, Status::InProgress)
            | (Self::MarkBlocked, _)
            | (Self::ClearBlock, Status::Blocked) => Ok(()),
            (Self::BeginSession | Self::EndSession, Status::Blocked) => {
                Err("item is blocked; unblock it first")
            }
            (Self::EndSession, Status::NotStarted) => Err("no session has been started"),
            (Self::ClearBlock, _) => Err("item is not blocked"),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStarted {
    pub id: String,
    pub session: u32,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEnded {
    pub id: String,
    pub session: u32,
    pub status: Status,
    /// `None` when the gate failed and the session stays open.
    pub outcome: Option<SessionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchUpdate {
    pub id: String,
    pub previous: Option<BranchStatus>,
    pub current: BranchStatus,
    pub commits_added: usize,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

fn rejected(item: &WorkItem, event: LifecycleEvent, reason: impl Into<String>) -> SddError {
    SddError::InvalidTransition {
        id: item.id.clone(),
        from: item.status,
        event: event.as_str(),
        reason: reason.into(),
    }
}

fn guard(item: &WorkItem, event: LifecycleEvent) -> Result<()> {
    event
        .accepts(item.status)
        .map_err(|reason| rejected(item, event, reason))
}

fn lookup<'a>(items: &'a BTreeMap<String, WorkItem>, id: &str) -> Result<&'a WorkItem> {
    items.get(id).ok_or_else(|| SddError::not_found(id))
}

fn lookup_mut<'a>(items: &'a mut BTreeMap<String, WorkItem>, id: &str) -> Result<&'a mut WorkItem> {
    items.get_mut(id).ok_or_else(|| SddError::not_found(id))
}

/// Open a session on `id`.
///
/// A `not_started` item must be ready. An `in_progress` item without an open
/// session gets the next session number. The first session also names the
/// item's branch and puts it in `in_progress`.
///
/// # Errors
///
/// [`SddError::InvalidTransition`] if the item is blocked, completed, not
/// ready, or already has an open session.
pub fn begin_session(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    now: DateTime<Utc>,
) -> Result<SessionStarted> {
    let item = lookup(items, id)?;
    guard(item, LifecycleEvent::BeginSession)?;

    if let Some(open) = item.active_session() {
        return Err(rejected(
            item,
            LifecycleEvent::BeginSession,
            format!("session {} is already open", open.number),
        ));
    }
    if item.status == Status::NotStarted {
        let unmet = DependencyGraph::new(items).unmet_dependencies(id);
        if !unmet.is_empty() {
            return Err(rejected(
                item,
                LifecycleEvent::BeginSession,
                format!("waiting on dependencies: {}", unmet.join(", ")),
            ));
        }
    }

    let item = lookup_mut(items, id)?;
    let number = item.sessions.last().map_or(1, |s| s.number + 1);
    item.sessions.push(SessionRecord {
        number,
        started_at: now,
        ended_at: None,
        outcome: None,
    });
    item.status = Status::InProgress;
    if item.git.branch.is_none() {
        item.git.branch = Some(format!("{}/{}", item.item_type, item.id));
    }
    if item.git.branch_status.is_none() {
        item.git.branch_status = Some(BranchStatus::InProgress);
    }
    item.updated_at = now;

    tracing::info!(id, session = number, "session started");
    Ok(SessionStarted {
        id: item.id.clone(),
        session: number,
        status: item.status,
        branch: item.git.branch.clone(),
    })
}

/// Number of the session [`end_session`] would close.
///
/// # Errors
///
/// [`SddError::InvalidTransition`] if the item is not `in_progress` or has no
/// open session.
pub fn open_session(items: &BTreeMap<String, WorkItem>, id: &str) -> Result<u32> {
    let item = lookup(items, id)?;
    guard(item, LifecycleEvent::EndSession)?;
    item.active_session().map(|s| s.number).ok_or_else(|| {
        rejected(
            item,
            LifecycleEvent::EndSession,
            "no open session; begin one first",
        )
    })
}

/// Close the open session on `id` given the gate verdict.
///
/// A failing verdict changes nothing: the session stays open and the status
/// stays `in_progress`. A passing verdict closes the session; the item
/// becomes `completed` only when `done` is `Some(true)`.
///
/// # Errors
///
/// [`SddError::InvalidTransition`] if the item is not `in_progress`, has no
/// open session, or (when completing) has incomplete dependencies.
pub fn end_session(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    verdict: &Verdict,
    done: Option<bool>,
    now: DateTime<Utc>,
) -> Result<SessionEnded> {
    let session = open_session(items, id)?;
    let item = lookup(items, id)?;

    if !verdict.passed {
        tracing::info!(
            id,
            session,
            failing = ?verdict.failing_names(),
            "quality gate failed, status unchanged"
        );
        return Ok(SessionEnded {
            id: item.id.clone(),
            session,
            status: item.status,
            outcome: None,
        });
    }

    let finish = done.unwrap_or(false);
    if finish {
        let unmet = DependencyGraph::new(items).unmet_dependencies(id);
        if !unmet.is_empty() {
            return Err(rejected(
                item,
                LifecycleEvent::EndSession,
                format!("dependencies not completed: {}", unmet.join(", ")),
            ));
        }
    }

    let item = lookup_mut(items, id)?;
    let outcome = if finish {
        item.status = Status::Completed;
        item.completed_at = Some(now);
        SessionOutcome::Completed
    } else {
        SessionOutcome::Continuing
    };
    close_open_session(item, outcome, now);
    item.updated_at = now;

    tracing::info!(id, session, status = %item.status, "session ended");
    Ok(SessionEnded {
        id: item.id.clone(),
        session,
        status: item.status,
        outcome: Some(outcome),
    })
}

fn close_open_session(item: &mut WorkItem, outcome: SessionOutcome, now: DateTime<Utc>) {
    if let Some(open) = item.sessions.last_mut().filter(|s| s.is_open()) {
        open.ended_at = Some(now);
        open.outcome = Some(outcome);
    }
}

/// Move `id` to `blocked` with `reason`.
///
/// An open session is closed with outcome `blocked`. Blocking an already
/// blocked item replaces the reason and keeps the state it will resume to.
///
/// # Errors
///
/// [`SddError::Validation`] for an empty reason and
/// [`SddError::InvalidTransition`] for a completed item.
pub fn mark_blocked(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<BlockInfo> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(SddError::validation("reason", "block reason must not be empty"));
    }
    let item = lookup_mut(items, id)?;
    guard(item, LifecycleEvent::MarkBlocked)?;

    let info = match item.blocked.take() {
        Some(existing) => BlockInfo {
            reason: reason.to_string(),
            ..existing
        },
        None => BlockInfo {
            reason: reason.to_string(),
            resume_to: item.status,
            since: now,
        },
    };
    close_open_session(item, SessionOutcome::Blocked, now);
    item.status = Status::Blocked;
    item.blocked = Some(info.clone());
    item.updated_at = now;

    tracing::info!(id, resume_to = %info.resume_to, "item blocked");
    Ok(info)
}

/// Return a blocked item to the status it had before it was blocked.
///
/// # Errors
///
/// [`SddError::InvalidTransition`] if the item is not blocked.
pub fn clear_block(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Status> {
    let item = lookup_mut(items, id)?;
    guard(item, LifecycleEvent::ClearBlock)?;

    let resume_to = item.blocked.take().map_or(Status::NotStarted, |b| b.resume_to);
    item.status = resume_to;
    item.updated_at = now;

    tracing::info!(id, status = %resume_to, "item unblocked");
    Ok(resume_to)
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// Apply observed git facts to the item's branch state and commit history.
///
/// Items that never had a session have no branch and are left alone.
///
/// # Errors
///
/// [`SddError::NotFound`] if `id` is unknown.
pub fn observe_branch(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    facts: &GitFacts,
    workflow: GitWorkflow,
    now: DateTime<Utc>,
) -> Result<Option<BranchUpdate>> {
    let item = lookup_mut(items, id)?;
    let Some(previous) = item.git.branch_status else {
        tracing::debug!(id, "no branch yet, git facts ignored");
        return Ok(None);
    };

    let current = branch::project(Some(previous), facts, workflow);
    let mut commits_added = 0;
    for sha in &facts.commits {
        if !item.git.commits.iter().any(|c| &c.sha == sha) {
            item.git.commits.push(CommitRef {
                sha: sha.clone(),
                message: None,
            });
            commits_added += 1;
        }
    }

    if current != previous || commits_added > 0 {
        item.git.branch_status = Some(current);
        item.updated_at = now;
        tracing::info!(id, from = %previous, to = %current, commits_added, "branch updated");
    }
    Ok(Some(BranchUpdate {
        id: item.id.clone(),
        previous: Some(previous),
        current,
        commits_added,
    }))
}

/// Mark the item's branch as `deleted`.
///
/// # Errors
///
/// [`SddError::Validation`] if the item has no branch.
pub fn abandon_branch(
    items: &mut BTreeMap<String, WorkItem>,
    id: &str,
    now: DateTime<Utc>,
) -> Result<BranchUpdate> {
    let item = lookup_mut(items, id)?;
    if item.git.branch.is_none() && item.git.branch_status.is_none() {
        return Err(SddError::validation(
            "branch",
            format!("'{id}' has no branch to abandon"),
        ));
    }
    let previous = item.git.branch_status;
    item.git.branch_status = Some(BranchStatus::Deleted);
    item.updated_at = now;
    tracing::info!(id, "branch abandoned");
    Ok(BranchUpdate {
        id: item.id.clone(),
        previous,
        current: BranchStatus::Deleted,
        commits_added: 0,
    })
}
