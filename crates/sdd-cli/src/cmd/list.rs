//! `sdd list` — items matching optional filters, in id order.

use std::io::Write;
use std::path::Path;

use clap::Args;

use super::show::write_item_row;
use super::{FilterArgs, open_project};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let orch = open_project(project_root)?;
    let items = orch.list(&args.filter.to_filter())?;
    render_mode(
        output,
        &items,
        |items, w| {
            for item in items {
                write_item_row(w, item)?;
            }
            Ok(())
        },
        |items, w| {
            pretty_section(w, &format!("{} item(s)", items.len()))?;
            for item in items {
                writeln!(
                    w,
                    "{:<32} {:<12} {:<9} {}",
                    item.id(),
                    item.status().as_str(),
                    item.priority.as_str(),
                    item.title
                )?;
            }
            Ok(())
        },
    )
}
