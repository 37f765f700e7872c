//! `sdd show` — one item with its place in the graph.

use std::io::{self, Write};
use std::path::Path;

use clap::Args;
use sdd_core::model::WorkItem;
use sdd_triage::session::ItemDetail;

use super::open_project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item ID to show.
    pub id: String,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let detail = orch.show(&args.id)?;
    render_mode(output, &detail, write_detail_text, write_detail_pretty)
}

/// `id  status  priority  title`, tab separated.
pub fn write_item_row(w: &mut dyn Write, item: &WorkItem) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}",
        item.id(),
        item.status(),
        item.priority,
        item.title
    )
}

pub fn write_item_pretty(w: &mut dyn Write, item: &WorkItem) -> io::Result<()> {
    pretty_section(w, &format!("{}  {}", item.id(), item.title))?;
    pretty_kv(w, "type", item.item_type.as_str())?;
    pretty_kv(w, "status", item.status().as_str())?;
    pretty_kv(w, "priority", item.priority.as_str())?;
    if let Some(milestone) = &item.milestone {
        pretty_kv(w, "milestone", milestone)?;
    }
    if let Some(estimate) = item.estimate {
        pretty_kv(w, "estimate", estimate.to_string())?;
    }
    if !item.dependencies().is_empty() {
        let deps: Vec<&str> = item.dependencies().iter().map(String::as_str).collect();
        pretty_kv(w, "depends on", deps.join(", "))?;
    }
    if let Some(branch) = &item.git().branch {
        let state = item
            .git()
            .branch_status()
            .map_or_else(String::new, |s| format!(" ({s})"));
        pretty_kv(w, "branch", format!("{branch}{state}"))?;
    }
    if let Some(block) = item.blocked() {
        pretty_kv(w, "blocked", &block.reason)?;
    }
    if let Some(description) = &item.description {
        writeln!(w)?;
        writeln!(w, "{description}")?;
    }
    for criterion in &item.acceptance_criteria {
        writeln!(w, "  [ ] {criterion}")?;
    }
    Ok(())
}

fn write_detail_text(detail: &ItemDetail, w: &mut dyn Write) -> io::Result<()> {
    write_item_row(w, &detail.item)?;
    writeln!(w, "ready\t{}", detail.ready)?;
    if !detail.unmet_dependencies.is_empty() {
        writeln!(w, "waiting_on\t{}", detail.unmet_dependencies.join(","))?;
    }
    if !detail.dependents.is_empty() {
        writeln!(w, "blocks\t{}", detail.dependents.join(","))?;
    }
    Ok(())
}

fn write_detail_pretty(detail: &ItemDetail, w: &mut dyn Write) -> io::Result<()> {
    write_item_pretty(w, &detail.item)?;
    pretty_kv(w, "ready", if detail.ready { "yes" } else { "no" })?;
    if !detail.unmet_dependencies.is_empty() {
        pretty_kv(w, "waiting on", detail.unmet_dependencies.join(", "))?;
    }
    if !detail.dependents.is_empty() {
        pretty_kv(w, "blocks", detail.dependents.join(", "))?;
    }
    let sessions = detail.item.sessions();
    if let Some(last) = sessions.last() {
        let state = last
            .outcome
            .map_or_else(|| "open".to_string(), |o| format!("{o:?}").to_lowercase());
        pretty_kv(w, "sessions", format!("{} (last: {state})", sessions.len()))?;
    }
    Ok(())
}
