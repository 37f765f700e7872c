//! `sdd end` — close the open session through the quality gate.
//!
//! Signals come from `--check name=status` flags and from configured check
//! commands (skipped with `--no-run`). Git facts come from `--ahead`,
//! `--behind`, `--pr`, `--merged`, `--branch-missing`, and `--commit`, or
//! from a JSON document via `--git-facts`.
//!
//! A failing gate prints the full outcome and then exits with code 4.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use clap::Args;
use sdd_core::gate::{CheckStatus, Signals};
use sdd_core::lifecycle::branch::{GitFacts, PrState};
use sdd_triage::{EndOutcome, SessionOrchestrator};

use super::open_project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct EndArgs {
    /// Item ID whose session ends.
    pub id: String,

    /// Check result as `name=status` (pass, fail, skipped, timed_out). Repeatable.
    #[arg(long = "check", value_name = "NAME=STATUS", value_parser = parse_check)]
    pub checks: Vec<(String, CheckStatus)>,

    /// The work is finished: complete the item if the gate passes.
    #[arg(long)]
    pub done: bool,

    /// Do not run configured check commands.
    #[arg(long)]
    pub no_run: bool,

    /// Commits on the branch not on the base branch.
    #[arg(long)]
    pub ahead: Option<u32>,

    /// Commits on the base branch not on the branch.
    #[arg(long)]
    pub behind: Option<u32>,

    /// Pull request state (none, open, closed, merged).
    #[arg(long, value_name = "STATE")]
    pub pr: Option<PrState>,

    /// The branch has been merged.
    #[arg(long)]
    pub merged: bool,

    /// The branch no longer exists.
    #[arg(long)]
    pub branch_missing: bool,

    /// Commit SHA to record (repeatable).
    #[arg(long = "commit", value_name = "SHA")]
    pub commits: Vec<String>,

    /// Git facts as a JSON object; overrides the individual git flags.
    #[arg(long, value_name = "JSON", conflicts_with_all = ["ahead", "behind", "pr", "merged", "branch_missing", "commits"])]
    pub git_facts: Option<String>,
}

/// The quality gate rejected the session end. Output was already rendered.
#[derive(Debug)]
pub struct GateFailed {
    pub id: String,
    pub failing: Vec<String>,
}

impl fmt::Display for GateFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quality gate failed for '{}': {}", self.id, self.failing.join(", "))
    }
}

impl std::error::Error for GateFailed {}

fn parse_check(raw: &str) -> Result<(String, CheckStatus), String> {
    let (name, status) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=STATUS, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty check name in '{raw}'"));
    }
    let status = status.trim().parse::<CheckStatus>().map_err(|e| e.to_string())?;
    Ok((name.to_string(), status))
}

impl EndArgs {
    fn signals(&self) -> Signals {
        self.checks.iter().cloned().collect()
    }

    fn git_facts(&self) -> anyhow::Result<Option<GitFacts>> {
        if let Some(raw) = &self.git_facts {
            return Ok(Some(serde_json::from_str(raw)?));
        }
        let any_flag = self.ahead.is_some()
            || self.behind.is_some()
            || self.pr.is_some()
            || self.merged
            || self.branch_missing
            || !self.commits.is_empty();
        if !any_flag {
            return Ok(None);
        }
        Ok(Some(GitFacts {
            ahead: self.ahead.unwrap_or(0),
            behind: self.behind.unwrap_or(0),
            pr_state: self.pr.unwrap_or_default(),
            merged: self.merged,
            branch_exists: !self.branch_missing,
            commits: self.commits.clone(),
        }))
    }
}

pub fn run_end(args: &EndArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch: SessionOrchestrator = open_project(project_root)?.with_check_commands(!args.no_run);
    let facts = args.git_facts()?;
    let done = args.done.then_some(true);

    let outcome = orch.end(&args.id, &args.signals(), done, facts.as_ref())?;
    render_mode(output, &outcome, write_text, write_pretty)?;

    if outcome.gate_failed() {
        return Err(GateFailed {
            id: args.id.clone(),
            failing: outcome
                .verdict
                .failing_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
        .into());
    }
    Ok(())
}

fn write_text(outcome: &EndOutcome, w: &mut dyn Write) -> io::Result<()> {
    let verdict = if outcome.verdict.passed { "pass" } else { "fail" };
    writeln!(
        w,
        "{}\tsession={}\t{}\tgate={verdict}",
        outcome.session.id, outcome.session.session, outcome.session.status
    )?;
    for failing in &outcome.verdict.failing_checks {
        writeln!(w, "failing\t{}\t{}", failing.name, failing.reason)?;
    }
    for warning in &outcome.verdict.warnings {
        writeln!(w, "warning\t{}\t{}", warning.name, warning.reason)?;
    }
    if let Some(branch) = &outcome.branch {
        writeln!(w, "branch\t{}", branch.current)?;
    }
    Ok(())
}

fn write_pretty(outcome: &EndOutcome, w: &mut dyn Write) -> io::Result<()> {
    let heading = if outcome.verdict.passed {
        format!("✓ session {} ended", outcome.session.session)
    } else {
        format!("✗ quality gate failed, session {} stays open", outcome.session.session)
    };
    pretty_section(w, &heading)?;
    pretty_kv(w, "item", &outcome.session.id)?;
    pretty_kv(w, "status", outcome.session.status.as_str())?;
    for run in &outcome.checks {
        pretty_kv(
            w,
            &format!("ran {}", run.name),
            format!("{} in {}ms ({})", run.status, run.elapsed_ms, run.log_path.display()),
        )?;
    }
    for failing in &outcome.verdict.failing_checks {
        pretty_kv(w, "failing", format!("{} ({})", failing.name, failing.reason))?;
    }
    for warning in &outcome.verdict.warnings {
        pretty_kv(w, "warning", format!("{} ({})", warning.name, warning.reason))?;
    }
    if let Some(branch) = &outcome.branch {
        pretty_kv(w, "branch", branch.current.as_str())?;
    }
    Ok(())
}
