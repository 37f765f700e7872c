//! `sdd block` / `sdd unblock`.

use std::path::Path;

use clap::Args;
use serde::Serialize;

use super::open_project;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct BlockArgs {
    /// Item ID to block.
    pub id: String,

    /// Why work cannot continue.
    #[arg(long)]
    pub reason: String,
}

#[derive(Args, Debug)]
pub struct UnblockArgs {
    /// Item ID to unblock.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct UnblockOutput<'a> {
    id: &'a str,
    status: sdd_core::model::Status,
}

pub fn run_block(args: &BlockArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let block = orch.mark_blocked(&args.id, &args.reason)?;
    render(output, &block, |b, w| {
        writeln!(w, "✓ {} blocked: {} (resumes to {})", args.id, b.reason, b.resume_to)
    })
}

pub fn run_unblock(args: &UnblockArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let status = orch.clear_block(&args.id)?;
    let result = UnblockOutput {
        id: &args.id,
        status,
    };
    render(output, &result, |r, w| writeln!(w, "✓ {} is {} again", r.id, r.status))
}
