//! `sdd graph` — projections of the dependency graph.

use std::io::{self, Write};
use std::path::Path;

use clap::{Args, ValueEnum};
use sdd_triage::{GraphQueryResult, GraphView};

use super::{FilterArgs, open_project};
use crate::output::{OutputMode, pretty_section, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ViewArg {
    #[default]
    All,
    Ready,
    CriticalPath,
    Bottlenecks,
    Focus,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Which projection to show.
    #[arg(long, value_enum, default_value_t = ViewArg::All)]
    pub view: ViewArg,

    /// Item to focus on (required with `--view focus`).
    #[arg(long, required_if_eq("view", "focus"))]
    pub id: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl GraphArgs {
    fn to_view(&self) -> GraphView {
        match (self.view, &self.id) {
            (ViewArg::All, _) => GraphView::All,
            (ViewArg::Ready, _) => GraphView::Ready,
            (ViewArg::CriticalPath, _) => GraphView::CriticalPath,
            (ViewArg::Bottlenecks, _) => GraphView::Bottlenecks,
            (ViewArg::Focus, id) => GraphView::Focus(id.clone().unwrap_or_default()),
        }
    }
}

pub fn run_graph(args: &GraphArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let result = orch.graph_query(&args.filter.to_filter(), &args.to_view())?;
    render(output, &result, write_result)
}

fn write_result(result: &GraphQueryResult, w: &mut dyn Write) -> io::Result<()> {
    match result {
        GraphQueryResult::All { nodes } => {
            pretty_section(w, "Dependency graph (dependencies first)")?;
            for node in nodes {
                let marker = if node.ready { "*" } else { " " };
                write!(w, "{marker} {} [{}]", node.id, node.status)?;
                if node.dependencies.is_empty() {
                    writeln!(w)?;
                } else {
                    writeln!(w, " <- {}", node.dependencies.join(", "))?;
                }
            }
        }
        GraphQueryResult::Ready { items } => {
            pretty_section(w, "Ready")?;
            for item in items {
                writeln!(w, "{}  {}  {}", item.id, item.priority, item.title)?;
            }
        }
        GraphQueryResult::CriticalPath(cp) => {
            pretty_section(w, &format!("Critical path (length {})", cp.total_length))?;
            writeln!(w, "{}", cp.critical_path.join(" -> "))?;
        }
        GraphQueryResult::Bottlenecks { bottlenecks } => {
            pretty_section(w, "Bottlenecks")?;
            for b in bottlenecks {
                writeln!(w, "{}  blocks {}: {}", b.id, b.score, b.dependents.join(", "))?;
            }
        }
        GraphQueryResult::Focus(n) => {
            pretty_section(w, &n.id)?;
            writeln!(w, "depends on: {}", n.dependencies.join(", "))?;
            writeln!(w, "blocks:     {}", n.dependents.join(", "))?;
        }
    }
    Ok(())
}
