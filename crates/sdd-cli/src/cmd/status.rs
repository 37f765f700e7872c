//! `sdd status` — store-wide counts.

use std::path::Path;

use clap::Args;

use super::open_project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

pub fn run_status(_args: &StatusArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let summary = orch.status()?;
    render_mode(
        output,
        &summary,
        |s, w| {
            let m = &s.metadata;
            writeln!(
                w,
                "total={} not_started={} in_progress={} blocked={} completed={} ready={} critical_path={}",
                m.total_items,
                m.not_started,
                m.in_progress,
                m.blocked,
                m.completed,
                s.ready,
                s.critical_path_length
            )
        },
        |s, w| {
            let m = &s.metadata;
            pretty_section(w, "Status")?;
            pretty_kv(w, "total", m.total_items.to_string())?;
            pretty_kv(w, "not started", m.not_started.to_string())?;
            pretty_kv(w, "in progress", m.in_progress.to_string())?;
            pretty_kv(w, "blocked", m.blocked.to_string())?;
            pretty_kv(w, "completed", m.completed.to_string())?;
            pretty_kv(w, "ready", s.ready.to_string())?;
            pretty_kv(w, "critical path", s.critical_path_length.to_string())?;
            if !s.active.is_empty() {
                pretty_kv(w, "active", s.active.join(", "))?;
            }
            pretty_kv(w, "updated", m.last_updated.to_rfc3339())
        },
    )
}
