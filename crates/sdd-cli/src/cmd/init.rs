//! `sdd init` — create `.sdd/` with an empty store and default config.

use std::path::Path;

use clap::Args;
use sdd_core::WorkItemStore;
use serde::Serialize;

use crate::output::{OutputMode, render};

#[derive(Args, Debug, Default)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    store: String,
}

pub fn run_init(_args: &InitArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let store = WorkItemStore::init(project_root)?;
    let result = InitOutput {
        ok: true,
        store: store.store_path().display().to_string(),
    };
    render(output, &result, |r, w| writeln!(w, "✓ initialized {}", r.store))
}
