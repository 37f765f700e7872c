//! One module per subcommand. Each exposes an `XArgs` clap struct and a
//! `run_x` function that talks to the orchestrator and renders the result.

pub mod block;
pub mod branch;
pub mod completions;
pub mod create;
pub mod delete;
pub mod dep;
pub mod end;
pub mod graph;
pub mod init;
pub mod list;
pub mod next;
pub mod show;
pub mod start;
pub mod status;
pub mod update;

use std::path::Path;

use clap::Args;
use sdd_core::model::{Priority, Status, WorkItemType};
use sdd_core::{SddError, WorkItemStore};
use sdd_triage::{ItemFilter, SessionOrchestrator};

/// Filters shared by `list`, `next`, and `graph`.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Only items with this status.
    #[arg(long)]
    pub status: Option<Status>,

    /// Only items of this type.
    #[arg(long = "type", value_name = "TYPE")]
    pub item_type: Option<WorkItemType>,

    /// Only items in this milestone.
    #[arg(long)]
    pub milestone: Option<String>,

    /// Only items with this priority.
    #[arg(long)]
    pub priority: Option<Priority>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> ItemFilter {
        ItemFilter {
            status: self.status,
            item_type: self.item_type,
            milestone: self.milestone.clone(),
            priority: self.priority,
        }
    }
}

/// Find the enclosing project and open its orchestrator.
pub fn open_project(project_root: &Path) -> anyhow::Result<SessionOrchestrator> {
    let root = WorkItemStore::discover(project_root).ok_or_else(|| SddError::NotInitialized {
        path: project_root.join(".sdd"),
    })?;
    Ok(SessionOrchestrator::open(&root)?)
}
