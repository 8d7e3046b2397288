//! `approve-override` command: record a governance override approval.

use crate::config::SwitchyardConfig;
use anyhow::{Context, Result};
use std::process::ExitCode;
use switchyard_ledger::Ledger;
use switchyard_protocol::Intent;

#[derive(Debug, clap::Args)]
pub struct ApproveArgs {
    /// Session the approval is scoped to
    #[arg(long)]
    pub session: String,

    /// Intent the approval is scoped to, e.g. DRAFT_CONTENT
    #[arg(long)]
    pub intent: Intent,

    /// Approver identity, recorded on the decision
    #[arg(long)]
    pub by: String,

    #[arg(long)]
    pub rationale: Option<String>,
}

pub async fn run(args: ApproveArgs, config: &SwitchyardConfig) -> Result<ExitCode> {
    let ledger_path = config.ledger_path();
    let ledger = Ledger::open(&ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))?;

    let decision = ledger
        .record_override_approval(
            &args.session,
            args.intent,
            &args.by,
            args.rationale.as_deref(),
        )
        .await?;

    println!(
        "Override approved: {} for {} in session {}",
        decision.id, args.intent, args.session
    );
    println!("Re-run the request with --override to use it.");

    Ok(ExitCode::SUCCESS)
}
