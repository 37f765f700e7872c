//! `sdd next` — recommend the next ready item.

use std::io::{self, Write};
use std::path::Path;

use clap::Args;
use sdd_triage::RankedItem;

use super::{FilterArgs, open_project};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct NextArgs {
    /// Show every ready candidate in rank order.
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run_next(args: &NextArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let filter = args.filter.to_filter();

    if args.all {
        let ranked = orch.rank(&filter)?;
        return render_mode(
            output,
            &ranked,
            |ranked, w| {
                for item in ranked {
                    write_ranked_row(w, item)?;
                }
                Ok(())
            },
            |ranked, w| {
                pretty_section(w, &format!("{} ready item(s)", ranked.len()))?;
                for (i, item) in ranked.iter().enumerate() {
                    write!(w, "{:>3}. ", i + 1)?;
                    write_ranked_pretty(w, item)?;
                }
                Ok(())
            },
        );
    }

    let next = orch.recommend(&filter)?;
    render_mode(
        output,
        &next,
        |next, w| match next {
            Some(item) => write_ranked_row(w, item),
            None => Ok(()),
        },
        |next, w| match next {
            Some(item) => write_ranked_pretty(w, item),
            None => writeln!(w, "nothing is ready"),
        },
    )
}

fn write_ranked_row(w: &mut dyn Write, item: &RankedItem) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        item.id, item.priority, item.on_critical_path, item.bottleneck_score, item.title
    )
}

fn write_ranked_pretty(w: &mut dyn Write, item: &RankedItem) -> io::Result<()> {
    let mut reasons = vec![item.priority.as_str().to_string()];
    if item.on_critical_path {
        reasons.push(format!("critical path ({})", item.chain_length));
    }
    if item.bottleneck_score > 0 {
        reasons.push(format!("unblocks {}", item.bottleneck_score));
    }
    writeln!(w, "{}  {}  [{}]", item.id, item.title, reasons.join(", "))
}
