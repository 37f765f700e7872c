//! Branch lifecycle attached to a work item.
//!
//! # Overview
//!
//! ```text
//! in_progress ─┬─> ready_to_merge ─┐
//!              └─> ready_for_pr ───┴─> pr_created ─┬─> merged
//!                                                  └─> pr_closed
//! any state ──(abandon)──> deleted
//! ```
//!
//! The machine does not take caller intent. [`project`] maps observed
//! repository facts ([`GitFacts`]) onto a [`BranchStatus`], and the result is
//! never allowed to rank below the current state. Projecting the same facts
//! twice yields the same state.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::super::model::item::ParseEnumError;

/// Branch states, in rough order of progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    InProgress,
    ReadyToMerge,
    ReadyForPr,
    PrCreated,
    PrClosed,
    Merged,
    Deleted,
}

impl BranchStatus {
    pub const ALL: [Self; 7] = [
        Self::InProgress,
        Self::ReadyToMerge,
        Self::ReadyForPr,
        Self::PrCreated,
        Self::PrClosed,
        Self::Merged,
        Self::Deleted,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::ReadyToMerge => "ready_to_merge",
            Self::ReadyForPr => "ready_for_pr",
            Self::PrCreated => "pr_created",
            Self::PrClosed => "pr_closed",
            Self::Merged => "merged",
            Self::Deleted => "deleted",
        }
    }

    /// Position in the progress order. Equal ranks are alternatives.
    const fn rank(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::ReadyToMerge | Self::ReadyForPr => 1,
            Self::PrCreated => 2,
            Self::PrClosed => 3,
            Self::Merged => 4,
            Self::Deleted => 5,
        }
    }

    /// `merged` and `deleted` accept no further projection.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Merged | Self::Deleted)
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "branch status",
                got: s.to_string(),
            })
    }
}

/// How finished branches are integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GitWorkflow {
    /// Push and open a pull request.
    #[default]
    Pr,
    /// Merge locally into the base branch.
    LocalMerge,
}

/// State of the pull request for the branch, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    #[default]
    None,
    Open,
    Closed,
    Merged,
}

impl FromStr for PrState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "merged" => Ok(Self::Merged),
            _ => Err(ParseEnumError {
                expected: "pr state",
                got: s.to_string(),
            }),
        }
    }
}

/// Repository facts observed by the git integration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitFacts {
    /// Commits on the branch not on the base branch.
    #[serde(default)]
    pub ahead: u32,
    /// Commits on the base branch not on the branch.
    #[serde(default)]
    pub behind: u32,
    #[serde(default)]
    pub pr_state: PrState,
    /// The branch has been merged into the base branch.
    #[serde(default)]
    pub merged: bool,
    #[serde(default = "default_true")]
    pub branch_exists: bool,
    /// New commit SHAs to append to the item's history.
    #[serde(default)]
    pub commits: Vec<String>,
}

impl Default for GitFacts {
    fn default() -> Self {
        Self {
            ahead: 0,
            behind: 0,
            pr_state: PrState::None,
            merged: false,
            branch_exists: true,
            commits: Vec::new(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// The state the facts alone describe, ignoring history.
#[must_use]
pub const fn observed(facts: &GitFacts, workflow: GitWorkflow) -> BranchStatus {
    if facts.merged || matches!(facts.pr_state, PrState::Merged) {
        return BranchStatus::Merged;
    }
    if !facts.branch_exists {
        return BranchStatus::Deleted;
    }
    match facts.pr_state {
        PrState::Closed => BranchStatus::PrClosed,
        PrState::Open => BranchStatus::PrCreated,
        PrState::None | PrState::Merged => {
            if facts.ahead == 0 {
                BranchStatus::InProgress
            } else {
                match workflow {
                    GitWorkflow::Pr => BranchStatus::ReadyForPr,
                    GitWorkflow::LocalMerge => BranchStatus::ReadyToMerge,
                }
            }
        }
    }
}

/// Advance `current` by the observed facts without losing progress.
///
/// A state with no branch yet starts from `in_progress`. Final states are
/// kept as they are.
#[must_use]
pub fn project(
    current: Option<BranchStatus>,
    facts: &GitFacts,
    workflow: GitWorkflow,
) -> BranchStatus {
    let current = current.unwrap_or(BranchStatus::InProgress);
    if current.is_final() {
        return current;
    }

    // Equal ranks are siblings; only strictly greater progress moves.
    let candidate = observed(facts, workflow);
    let next = if candidate.rank() > current.rank() {
        candidate
    } else {
        current
    };

    if next != current {
        tracing::debug!(from = %current, to = %next, "branch status projected");
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(ahead: u32, pr_state: PrState) -> GitFacts {
        GitFacts {
            ahead,
            pr_state,
            ..GitFacts::default()
        }
    }

    #[test]
    fn fresh_branch_without_commits_stays_in_progress() {
        let next = project(None, &facts(0, PrState::None), GitWorkflow::Pr);
        assert_eq!(next, BranchStatus::InProgress);
    }

    #[test]
    fn workflow_selects_ready_state() {
        let ahead = facts(3, PrState::None);
        assert_eq!(
            project(Some(BranchStatus::InProgress), &ahead, GitWorkflow::Pr),
            BranchStatus::ReadyForPr
        );
        assert_eq!(
            project(Some(BranchStatus::InProgress), &ahead, GitWorkflow::LocalMerge),
            BranchStatus::ReadyToMerge
        );
    }

    #[test]
    fn full_pr_path() {
        let mut state = project(None, &facts(2, PrState::None), GitWorkflow::Pr);
        assert_eq!(state, BranchStatus::ReadyForPr);
        state = project(Some(state), &facts(2, PrState::Open), GitWorkflow::Pr);
        assert_eq!(state, BranchStatus::PrCreated);
        state = project(Some(state), &facts(2, PrState::Merged), GitWorkflow::Pr);
        assert_eq!(state, BranchStatus::Merged);
    }

    #[test]
    fn never_regresses() {
        // PR is open, later observation sees no PR and no commits ahead.
        let state = project(
            Some(BranchStatus::PrCreated),
            &facts(0, PrState::None),
            GitWorkflow::Pr,
        );
        assert_eq!(state, BranchStatus::PrCreated);

        // A workflow switch does not move between the two ready states.
        let state = project(
            Some(BranchStatus::ReadyForPr),
            &facts(1, PrState::None),
            GitWorkflow::LocalMerge,
        );
        assert_eq!(state, BranchStatus::ReadyForPr);
        let state = project(
            Some(BranchStatus::ReadyToMerge),
            &facts(1, PrState::None),
            GitWorkflow::Pr,
        );
        assert_eq!(state, BranchStatus::ReadyToMerge);
    }

    #[test]
    fn merged_is_final_even_if_branch_disappears() {
        let gone = GitFacts {
            branch_exists: false,
            ..GitFacts::default()
        };
        assert_eq!(
            project(Some(BranchStatus::Merged), &gone, GitWorkflow::Pr),
            BranchStatus::Merged
        );
    }

    #[test]
    fn missing_unmerged_branch_is_deleted() {
        let gone = GitFacts {
            branch_exists: false,
            ..GitFacts::default()
        };
        assert_eq!(
            project(Some(BranchStatus::ReadyForPr), &gone, GitWorkflow::Pr),
            BranchStatus::Deleted
        );
    }

    #[test]
    fn projection_is_idempotent() {
        let observations = [
            facts(0, PrState::None),
            facts(1, PrState::None),
            facts(1, PrState::Open),
            facts(1, PrState::Closed),
            facts(1, PrState::Merged),
        ];
        for start in BranchStatus::ALL {
            for obs in &observations {
                let once = project(Some(start), obs, GitWorkflow::Pr);
                let twice = project(Some(once), obs, GitWorkflow::Pr);
                assert_eq!(once, twice, "start={start} facts={obs:?}");
            }
        }
    }

    #[test]
    fn parse_accepts_dashes() {
        assert_eq!(
            "ready-for-pr".parse::<BranchStatus>().unwrap(),
            BranchStatus::ReadyForPr
        );
        assert!("shipped".parse::<BranchStatus>().is_err());
        assert_eq!("OPEN".parse::<PrState>().unwrap(), PrState::Open);
    }
}
