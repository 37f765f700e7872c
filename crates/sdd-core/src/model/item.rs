use std::collections::BTreeSet;
use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::branch::BranchStatus;

/// The closed set of work-item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemType {
    Feature,
    Bug,
    Refactor,
    Security,
    IntegrationTest,
    Deployment,
}

impl WorkItemType {
    pub const ALL: [Self; 6] = [
        Self::Feature,
        Self::Bug,
        Self::Refactor,
        Self::Security,
        Self::IntegrationTest,
        Self::Deployment,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Refactor => "refactor",
            Self::Security => "security",
            Self::IntegrationTest => "integration_test",
            Self::Deployment => "deployment",
        }
    }
}

/// The four lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    InProgress,
    Blocked,
    Completed,
}

impl Status {
    pub const ALL: [Self; 4] = [
        Self::NotStarted,
        Self::InProgress,
        Self::Blocked,
        Self::Completed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
        }
    }

    /// `completed` has no outgoing transitions in normal operation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Priority, totally ordered: `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Critical => 3,
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Gate passed and the caller confirmed the work is finished.
    Completed,
    /// Gate passed but more work remains.
    Continuing,
    /// Session was closed because the item was marked blocked.
    Blocked,
}

/// One entry in the append-only session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outcome: Option<SessionOutcome>,
}

impl SessionRecord {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A commit recorded against the work item's branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Version-control state attached to a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GitInfo {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub(crate) branch_status: Option<BranchStatus>,
    #[serde(default)]
    pub(crate) commits: Vec<CommitRef>,
}

impl GitInfo {
    #[must_use]
    pub const fn branch_status(&self) -> Option<BranchStatus> {
        self.branch_status
    }

    /// Commits in the order they were recorded.
    #[must_use]
    pub fn commits(&self) -> &[CommitRef] {
        &self.commits
    }
}

/// Present while an item is `blocked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub reason: String,
    /// The status restored by `clear_block`.
    pub resume_to: Status,
    pub since: DateTime<Utc>,
}

/// All persisted fields for a work item.
///
/// `status`, `sessions`, and `git.branch_status` are only changed through
/// [`crate::lifecycle`]. `dependencies` only changes through
/// [`crate::graph::deps`], which runs the cycle check first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub item_type: WorkItemType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub(crate) status: Status,
    pub priority: Priority,
    #[serde(default)]
    pub(crate) dependencies: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    /// Duration estimate; used as the critical-path weight when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<u32>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub(crate) git: GitInfo,
    #[serde(default)]
    pub(crate) sessions: Vec<SessionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) blocked: Option<BlockInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// A fresh `not_started` item with no history.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        item_type: WorkItemType,
        title: impl Into<String>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            item_type,
            title: title.into(),
            description: None,
            status: Status::NotStarted,
            priority,
            dependencies: BTreeSet::new(),
            milestone: None,
            estimate: None,
            acceptance_criteria: Vec::new(),
            git: GitInfo::default(),
            sessions: Vec::new(),
            blocked: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    #[must_use]
    pub const fn git(&self) -> &GitInfo {
        &self.git
    }

    /// Session history, oldest first.
    #[must_use]
    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    #[must_use]
    pub const fn blocked(&self) -> Option<&BlockInfo> {
        self.blocked.as_ref()
    }

    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// The open session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<&SessionRecord> {
        self.sessions.last().filter(|s| s.is_open())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Weight of this item on a dependency chain: its estimate, or 1.
    #[must_use]
    pub fn weight(&self) -> u64 {
        self.estimate.map_or(1, |e| u64::from(e.max(1)))
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}

impl FromStr for WorkItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "type",
                got: s.to_string(),
            })
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "status",
                got: s.to_string(),
            })
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}
