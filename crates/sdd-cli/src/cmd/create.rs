//! `sdd create` — add a work item. The id is derived from type and title.

use std::path::Path;

use clap::Args;
use sdd_core::model::{Priority, WorkItemType};
use sdd_triage::NewItem;

use super::open_project;
use super::show::{write_item_pretty, write_item_row};
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Short title; also the basis of the generated id.
    #[arg(long)]
    pub title: String,

    /// Item type.
    #[arg(long = "type", value_name = "TYPE", default_value = "feature")]
    pub item_type: WorkItemType,

    #[arg(long, default_value = "medium")]
    pub priority: Priority,

    /// Item this one depends on (repeatable).
    #[arg(long = "dep", value_name = "ID")]
    pub deps: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub milestone: Option<String>,

    /// Positive duration estimate, used as critical-path weight.
    #[arg(long)]
    pub estimate: Option<u32>,

    /// Acceptance criterion (repeatable).
    #[arg(long = "criterion", value_name = "TEXT")]
    pub criteria: Vec<String>,
}

pub fn run_create(args: &CreateArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let mut new = NewItem::new(args.item_type, args.title.clone());
    new.priority = args.priority;
    new.dependencies = args.deps.iter().cloned().collect();
    new.description.clone_from(&args.description);
    new.milestone.clone_from(&args.milestone);
    new.estimate = args.estimate;
    new.acceptance_criteria.clone_from(&args.criteria);

    let item = orch.create(new)?;
    render_mode(
        output,
        &item,
        |item, w| write_item_row(w, item),
        |item, w| write_item_pretty(w, item),
    )
}
