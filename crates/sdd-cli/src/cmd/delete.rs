//! `sdd delete` — remove an item. Refuses while other items depend on it
//! unless `--detach` is given.

use std::path::Path;

use clap::Args;
use sdd_core::graph::deps::CascadePolicy;

use super::open_project;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Item ID to delete.
    pub id: String,

    /// Remove the item from the dependency sets of its dependents.
    #[arg(long)]
    pub detach: bool,
}

pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let policy = if args.detach {
        CascadePolicy::Detach
    } else {
        CascadePolicy::Refuse
    };
    let removed = orch.delete(&args.id, policy)?;
    render(output, &removed, |r, w| {
        writeln!(w, "✓ deleted {}", r.item.id())?;
        if !r.detached_from.is_empty() {
            writeln!(w, "  detached from: {}", r.detached_from.join(", "))?;
        }
        Ok(())
    })
}
