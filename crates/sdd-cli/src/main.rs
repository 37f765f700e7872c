#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::end::GateFailed;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use sdd_core::config::{UserConfig, load_user_config};
use sdd_core::{ErrorCode, SddError};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sdd: session-driven work items with a quality-gated lifecycle",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self, user: &UserConfig) -> OutputMode {
        resolve_output_mode(self.format, self.json, user.output.as_deref())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize an sdd project",
        long_about = "Create .sdd/ with an empty work-item store and a default config.toml.",
        after_help = "EXAMPLES:\n    sdd init\n    sdd init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Items",
        about = "Create a work item",
        after_help = "EXAMPLES:\n    # A feature with one dependency\n    sdd create --title \"Checkout flow\" --dep feature_login\n\n    # A high-priority bug with an estimate\n    sdd create --type bug --title \"Session leak\" --priority high --estimate 3"
    )]
    Create(cmd::create::CreateArgs),

    #[command(next_help_heading = "Items", about = "List work items")]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Items", about = "Show one work item")]
    Show(cmd::show::ShowArgs),

    #[command(next_help_heading = "Items", about = "Edit title, priority, estimate, and other fields")]
    Update(cmd::update::UpdateArgs),

    #[command(next_help_heading = "Items", about = "Add or remove dependencies")]
    Dep(cmd::dep::DepArgs),

    #[command(
        next_help_heading = "Items",
        about = "Delete a work item",
        after_help = "EXAMPLES:\n    # Fails if anything depends on it\n    sdd delete feature_old\n\n    # Detach dependents first\n    sdd delete feature_old --detach"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Sessions",
        about = "Recommend the next item to work on",
        after_help = "EXAMPLES:\n    sdd next\n    sdd next --all --milestone v1"
    )]
    Next(cmd::next::NextArgs),

    #[command(next_help_heading = "Sessions", about = "Begin a session on an item")]
    Start(cmd::start::StartArgs),

    #[command(
        next_help_heading = "Sessions",
        about = "End the open session through the quality gate",
        after_help = "EXAMPLES:\n    # Report results and finish the item\n    sdd end feature_login --check tests=pass --check lint=pass --done\n\n    # Record branch progress without running commands\n    sdd end feature_login --no-run --ahead 3 --pr open\n\nEXIT CODES:\n    0 gate passed, 4 gate failed"
    )]
    End(cmd::end::EndArgs),

    #[command(next_help_heading = "Sessions", about = "Mark an item blocked")]
    Block(cmd::block::BlockArgs),

    #[command(next_help_heading = "Sessions", about = "Clear a block")]
    Unblock(cmd::block::UnblockArgs),

    #[command(next_help_heading = "Sessions", about = "Branch lifecycle actions")]
    Branch(cmd::branch::BranchArgs),

    #[command(
        next_help_heading = "Read",
        about = "Query the dependency graph",
        after_help = "EXAMPLES:\n    sdd graph --view critical-path\n    sdd graph --view bottlenecks --json\n    sdd graph --view focus --id feature_login"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(next_help_heading = "Read", about = "Summary counts for the project")]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    sdd completions bash\n    sdd completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SDD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "sdd=debug,info"
        } else {
            "sdd=info,warn"
        })
    });

    let format = env::var("SDD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Map a command failure to its process exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(sdd) = err.downcast_ref::<SddError>() {
        sdd.exit_code()
    } else if err.downcast_ref::<GateFailed>().is_some() {
        ErrorCode::QualityGateFailed.exit_code()
    } else {
        ErrorCode::InternalUnexpected.exit_code()
    }
}

fn cli_error_for(err: &anyhow::Error) -> CliError {
    if let Some(sdd) = err.downcast_ref::<SddError>() {
        return CliError::from(sdd);
    }
    let code = if err.downcast_ref::<GateFailed>().is_some() {
        ErrorCode::QualityGateFailed
    } else {
        ErrorCode::InternalUnexpected
    };
    CliError {
        message: format!("{err:#}"),
        suggestion: code.hint().map(str::to_string),
        error_code: Some(code.code().to_string()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let user_config = load_user_config().unwrap_or_else(|e| {
        tracing::warn!("ignoring user config: {e:#}");
        UserConfig::default()
    });
    let output = cli.output_mode(&user_config);

    let result = env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|project_root| run(cli.command, output, &project_root));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(output, &cli_error_for(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(command: Commands, output: OutputMode, project_root: &std::path::Path) -> anyhow::Result<()> {
    match command {
        Commands::Init(args) => cmd::init::run_init(&args, output, project_root),
        Commands::Create(args) => cmd::create::run_create(&args, output, project_root),
        Commands::List(args) => cmd::list::run_list(&args, output, project_root),
        Commands::Show(args) => cmd::show::run_show(&args, output, project_root),
        Commands::Update(args) => cmd::update::run_update(&args, output, project_root),
        Commands::Dep(args) => cmd::dep::run_dep(&args, output, project_root),
        Commands::Delete(args) => cmd::delete::run_delete(&args, output, project_root),
        Commands::Next(args) => cmd::next::run_next(&args, output, project_root),
        Commands::Start(args) => cmd::start::run_start(&args, output, project_root),
        Commands::End(args) => cmd::end::run_end(&args, output, project_root),
        Commands::Block(args) => cmd::block::run_block(&args, output, project_root),
        Commands::Unblock(args) => cmd::block::run_unblock(&args, output, project_root),
        Commands::Branch(args) => cmd::branch::run_branch(&args, output, project_root),
        Commands::Graph(args) => cmd::graph::run_graph(&args, output, project_root),
        Commands::Status(args) => cmd::status::run_status(&args, output, project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
