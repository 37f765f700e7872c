//! `sdd update` — edit descriptive fields of an item.

use std::path::Path;

use clap::Args;
use sdd_core::model::Priority;
use sdd_triage::ItemPatch;

use super::open_project;
use super::show::{write_item_pretty, write_item_row};
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Item ID to update.
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub milestone: Option<String>,

    #[arg(long)]
    pub estimate: Option<u32>,

    /// Replace the acceptance criteria (repeatable).
    #[arg(long = "criterion", value_name = "TEXT")]
    pub criteria: Vec<String>,
}

impl UpdateArgs {
    fn to_patch(&self) -> ItemPatch {
        ItemPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            milestone: self.milestone.clone(),
            estimate: self.estimate,
            acceptance_criteria: (!self.criteria.is_empty()).then(|| self.criteria.clone()),
        }
    }
}

pub fn run_update(args: &UpdateArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let item = orch.update(&args.id, args.to_patch())?;
    render_mode(
        output,
        &item,
        |item, w| write_item_row(w, item),
        |item, w| write_item_pretty(w, item),
    )
}
