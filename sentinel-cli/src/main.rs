//! Sentinel: gated, auditable change steps for one repository at a time.
//!
//! # Usage
//!
//! ```text
//! sentinel init [--name <repo>] [--role <text>]
//! sentinel propose [--from-plan|--no-plan] [--force] [--goal <text> --allow <path>...]
//! sentinel compile
//! sentinel verify [--staged] [--check-logic] [--json]
//! sentinel accept [<step-id>]
//! sentinel abandon
//! sentinel plan init|status|show
//! sentinel test [--step <id>]
//! sentinel sync-external --from <path>...
//! sentinel snapshot
//! sentinel diff-baseline [--json]
//! ```
//!
//! Exit codes: 0 success/PASS, 1 FAIL verdict or failing test, 2 config,
//! 3 precondition, 4 integrity, 5 runtime.

mod commands;
mod git;
mod reviewer;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    init::InitArgs, plan::PlanCommand, snapshot::DiffBaselineArgs, snapshot::SnapshotArgs,
    step::AcceptArgs, step::ProposeArgs, step::VerifyArgs, sync::SyncArgs, test::TestArgs,
    Outcome, Workspace,
};
use sentinel_core::StateError;
use sentinel_workflow::{exit_code_for, WorkflowError};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sentinel",
    version,
    about = "Propose, gate, and record architecture-safe change steps",
    long_about = None,
)]
struct Cli {
    /// Repository root (default: current directory).
    #[arg(long, global = true, env = "SENTINEL_REPO", value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug). SENTINEL_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold the .sentinel state directory.
    Init(InitArgs),

    /// Propose the next step.
    Propose(ProposeArgs),

    /// Render the brief, checklist and output template for the current step.
    Compile,

    /// Check working-tree changes against the current step.
    Verify(VerifyArgs),

    /// Record the verified step in the audit history.
    Accept(AcceptArgs),

    /// Drop the pending step without recording it.
    Abandon,

    /// Manage the implementation plan.
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },

    /// Re-check features of completed plan steps.
    Test(TestArgs),

    /// Pull deviation state from dependency repositories.
    SyncExternal(SyncArgs),

    /// Re-capture the baseline snapshot (explicit overwrite).
    Snapshot(SnapshotArgs),

    /// Compare the working tree's structure against the baseline.
    DiffBaseline(DiffBaselineArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Failed) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    let ws = Workspace::new(cli.repo)?;
    match cli.command {
        Commands::Init(args) => args.run(&ws),
        Commands::Propose(args) => args.run(&ws),
        Commands::Compile => commands::step::compile(&ws),
        Commands::Verify(args) => args.run(&ws),
        Commands::Accept(args) => args.run(&ws),
        Commands::Abandon => commands::step::abandon(&ws),
        Commands::Plan { command } => commands::plan::run(command, &ws),
        Commands::Test(args) => args.run(&ws),
        Commands::SyncExternal(args) => args.run(&ws),
        Commands::Snapshot(args) => args.run(&ws),
        Commands::DiffBaseline(args) => args.run(&ws),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("SENTINEL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Recovers the error category from the first typed error in the chain.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<WorkflowError>() {
            return e.exit_code() as u8;
        }
        if let Some(e) = cause.downcast_ref::<StateError>() {
            return exit_code_for(e.category()) as u8;
        }
    }
    5
}
