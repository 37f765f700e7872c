//! `sdd dep` — manage dependency links between work items.
//!
//! - `sdd dep add <id> <dependency>`: `<id>` now waits on `<dependency>`
//! - `sdd dep rm <id> <dependency>`: drop that link

use std::path::Path;

use clap::{Args, Subcommand};
use serde::Serialize;

use super::open_project;
use crate::output::{OutputMode, render};

// ---------------------------------------------------------------------------
// Clap types
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommand,
}

#[derive(Subcommand, Debug)]
pub enum DepCommand {
    #[command(
        about = "Make an item depend on another",
        after_help = "EXAMPLES:\n    # feature_checkout waits on feature_login\n    sdd dep add feature_checkout feature_login"
    )]
    Add(DepLinkArgs),

    #[command(
        about = "Remove a dependency link",
        after_help = "EXAMPLES:\n    sdd dep rm feature_checkout feature_login"
    )]
    Rm(DepLinkArgs),
}

#[derive(Args, Debug)]
pub struct DepLinkArgs {
    /// The dependent item.
    pub id: String,

    /// The item it depends on.
    pub dependency: String,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DepOutput<'a> {
    id: &'a str,
    dependency: &'a str,
    /// `false` when the link was already in the requested state.
    changed: bool,
}

// ---------------------------------------------------------------------------
// Command runners
// ---------------------------------------------------------------------------

pub fn run_dep(args: &DepArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let (link, changed, verb) = match &args.command {
        DepCommand::Add(link) => (link, orch.add_dependency(&link.id, &link.dependency)?, "now depends on"),
        DepCommand::Rm(link) => (
            link,
            orch.remove_dependency(&link.id, &link.dependency)?,
            "no longer depends on",
        ),
    };

    let result = DepOutput {
        id: &link.id,
        dependency: &link.dependency,
        changed,
    };
    render(output, &result, |r, w| {
        if r.changed {
            writeln!(w, "✓ {} {verb} {}", r.id, r.dependency)
        } else {
            writeln!(w, "unchanged: {} {verb} {}", r.id, r.dependency)
        }
    })
}
