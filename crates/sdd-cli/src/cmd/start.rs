//! `sdd start` — open a session on an item.

use std::path::Path;

use clap::Args;

use super::open_project;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Item ID to start (or resume).
    pub id: String,
}

pub fn run_start(args: &StartArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let started = orch.begin(&args.id)?;
    render(output, &started, |s, w| {
        write!(w, "✓ {} session {} started", s.id, s.session)?;
        match &s.branch {
            Some(branch) => writeln!(w, " on {branch}"),
            None => writeln!(w),
        }
    })
}
