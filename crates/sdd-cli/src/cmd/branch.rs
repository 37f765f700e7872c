//! `sdd branch` — explicit branch lifecycle actions.

use std::path::Path;

use clap::{Args, Subcommand};

use super::open_project;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct BranchArgs {
    #[command(subcommand)]
    pub command: BranchCommand,
}

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// Mark an item's branch as deleted.
    Abandon {
        /// Item ID whose branch is abandoned.
        id: String,
    },
}

pub fn run_branch(args: &BranchArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    match &args.command {
        BranchCommand::Abandon { id } => {
            let update = orch.abandon_branch(id)?;
            render(output, &update, |u, w| {
                writeln!(w, "✓ {} branch {}", u.id, u.current)
            })
        }
    }
}
