//! `review` command: decide a held task.

use crate::config::SwitchyardConfig;
use anyhow::{Context, Result};
use std::process::ExitCode;
use switchyard_ledger::{Ledger, ReviewVerdict};

#[derive(Debug, clap::Args)]
pub struct ReviewArgs {
    /// Task under review
    pub task_id: String,

    /// retry, close, or reject
    pub verdict: ReviewVerdict,

    /// Reviewer identity, recorded on the decision
    #[arg(long)]
    pub by: String,

    #[arg(long)]
    pub reason: Option<String>,

    /// Closing artifact id (close only)
    #[arg(long)]
    pub artifact: Option<String>,
}

pub async fn run(args: ReviewArgs, config: &SwitchyardConfig) -> Result<ExitCode> {
    let ledger_path = config.ledger_path();
    let ledger = Ledger::open(&ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))?;

    let task = ledger
        .human_review(
            &args.task_id,
            args.verdict,
            &args.by,
            args.reason.as_deref(),
            args.artifact.as_deref(),
        )
        .await?;

    match args.verdict {
        ReviewVerdict::Retry => {
            println!("Retry approved for {}; task is back in the queue.", task.id)
        }
        ReviewVerdict::Close => println!("Closed {} as done.", task.id),
        ReviewVerdict::Reject => {
            println!("Rejected {}; the hold is now permanent.", task.id)
        }
    }

    Ok(ExitCode::SUCCESS)
}
