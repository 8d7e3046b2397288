//! `ledger` subcommands: read-only listings over the audit tables.

use crate::cli::output::{or_dash, print_table, truncate};
use crate::config::SwitchyardConfig;
use anyhow::{Context, Result};
use std::process::ExitCode;
use switchyard_ledger::Ledger;

#[derive(Debug, clap::Subcommand)]
pub enum LedgerCommand {
    /// List sessions, most recently active first
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List audited actions, newest first
    Actions {
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List recorded decisions, newest first
    Decisions {
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List artifacts, newest first
    Artifacts {
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn run(command: LedgerCommand, config: &SwitchyardConfig) -> Result<ExitCode> {
    let ledger_path = config.ledger_path();
    let ledger = Ledger::open(&ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))?;

    match command {
        LedgerCommand::Sessions { limit } => {
            let sessions = ledger.list_sessions(limit).await?;
            if sessions.is_empty() {
                println!("No sessions.");
                return Ok(ExitCode::SUCCESS);
            }
            let rows = sessions
                .iter()
                .map(|s| {
                    vec![
                        s.id.clone(),
                        s.initiator.to_string(),
                        s.status.to_string(),
                        s.request_count.to_string(),
                        s.last_active_at.clone(),
                    ]
                })
                .collect();
            print_table(&["ID", "INITIATOR", "STATUS", "REQUESTS", "LAST ACTIVE"], rows);
        }
        LedgerCommand::Actions { session, limit } => {
            let actions = ledger.list_actions(session.as_deref(), limit).await?;
            if actions.is_empty() {
                println!("No actions.");
                return Ok(ExitCode::SUCCESS);
            }
            let rows = actions
                .iter()
                .map(|a| {
                    vec![
                        a.id.clone(),
                        a.session_id.clone(),
                        a.kind.to_string(),
                        a.intent.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string()),
                        a.state.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                        a.created_at.clone(),
                    ]
                })
                .collect();
            print_table(&["ID", "SESSION", "KIND", "INTENT", "STATE", "AT"], rows);
        }
        LedgerCommand::Decisions { session, limit } => {
            let decisions = ledger.list_decisions(session.as_deref(), limit).await?;
            if decisions.is_empty() {
                println!("No decisions.");
                return Ok(ExitCode::SUCCESS);
            }
            let rows = decisions
                .iter()
                .map(|d| {
                    vec![
                        d.id.clone(),
                        d.session_id.clone(),
                        d.kind.to_string(),
                        truncate(&d.subject, 40),
                        d.decided_by.clone(),
                        or_dash(d.reason.as_deref()),
                    ]
                })
                .collect();
            print_table(&["ID", "SESSION", "KIND", "SUBJECT", "BY", "REASON"], rows);
        }
        LedgerCommand::Artifacts { session, limit } => {
            let artifacts = ledger.list_artifacts(session.as_deref(), limit).await?;
            if artifacts.is_empty() {
                println!("No artifacts.");
                return Ok(ExitCode::SUCCESS);
            }
            let rows = artifacts
                .iter()
                .map(|a| {
                    vec![
                        a.id.clone(),
                        a.session_id.clone(),
                        a.agent.clone(),
                        a.kind.clone(),
                        or_dash(a.title.as_deref()),
                        or_dash(a.classification.as_deref()),
                        if a.repaired { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            print_table(
                &["ID", "SESSION", "AGENT", "KIND", "TITLE", "CLASS", "REPAIRED"],
                rows,
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
