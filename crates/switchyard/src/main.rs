//! Switchyard: governed dispatch for an internal multi-agent task pipeline.
//!
//! Routes structured work requests through intent classification, a tiered
//! governance gate, contract-validated generation, and an append-style audit
//! ledger. Every state change lands in SQLite; nothing is written for a
//! denied request.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use switchyard_logging::{default_config_path, init_logging, LogConfig};
use tracing::error;

mod cli;
mod config;

use config::SwitchyardConfig;

#[derive(Parser, Debug)]
#[command(
    name = "switchyard",
    about = "Governed dispatch for an internal multi-agent task pipeline",
    version
)]
struct Cli {
    /// Mirror the full log filter on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.switchyard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the Switchyard home: config, contracts, and ledger schema
    Init,

    /// Route one work request document through the dispatch pipeline
    Route(cli::route::RouteArgs),

    /// Work the task queue
    Task {
        #[command(subcommand)]
        command: cli::task::TaskCommand,
    },

    /// Decide a held task: retry, close, or reject
    Review(cli::review::ReviewArgs),

    /// Record a governance override approval for a session and intent
    ApproveOverride(cli::approve::ApproveArgs),

    /// Inspect the audit ledger
    Ledger {
        #[command(subcommand)]
        command: cli::ledger_cmd::LedgerCommand,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep stderr to warnings when stdout carries a JSON document.
    let quiet = matches!(&cli.command, Commands::Route(args) if args.json);
    if let Err(err) = init_logging(LogConfig {
        app_name: "switchyard",
        verbose: cli.verbose,
        quiet,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{:#}", err), "Command failed");
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = SwitchyardConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match cli.command {
        Commands::Init => cli::init::run(&config_path, &config).await,
        Commands::Route(args) => cli::route::run(args, &config).await,
        Commands::Task { command } => cli::task::run(command, &config).await,
        Commands::Review(args) => cli::review::run(args, &config).await,
        Commands::ApproveOverride(args) => cli::approve::run(args, &config).await,
        Commands::Ledger { command } => cli::ledger_cmd::run(command, &config).await,
    }
}
