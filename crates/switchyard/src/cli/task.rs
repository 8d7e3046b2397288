//! `task` subcommands: queue pop, listings, closure, and holds.

use crate::cli::output::{or_dash, print_table, truncate};
use crate::config::SwitchyardConfig;
use anyhow::{Context, Result};
use std::process::ExitCode;
use switchyard_ledger::{Ledger, TaskRecord};
use switchyard_protocol::{FailureKind, TaskStatus};

#[derive(Debug, clap::Subcommand)]
pub enum TaskCommand {
    /// Claim the oldest todo task and mark it doing
    Pop {
        /// Also claim seeded demo tasks
        #[arg(long)]
        include_synthetic: bool,
    },
    /// List tasks in queue order (oldest first)
    List {
        /// Filter by status: todo, doing, done, or blocked
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one task in full
    Show { task_id: String },
    /// Close a claimed (doing) task
    Close {
        task_id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
        /// Artifact produced by the work, if any
        #[arg(long)]
        artifact: Option<String>,
    },
    /// Put a task behind its stop-loss hold
    StopLoss {
        task_id: String,
        #[arg(long)]
        reason: String,
        /// Pipeline step that failed
        #[arg(long)]
        step: String,
        /// Failure kind: REJECTED, BLOCKED, GATED, REPAIR_FAILED, POLICY_GATE
        #[arg(long)]
        failure: FailureKind,
    },
    /// Put a task behind a policy gate before it runs
    PolicyGate {
        task_id: String,
        #[arg(long)]
        reason: String,
    },
}

pub async fn run(command: TaskCommand, config: &SwitchyardConfig) -> Result<ExitCode> {
    let ledger_path = config.ledger_path();
    let ledger = Ledger::open(&ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))?;

    match command {
        TaskCommand::Pop { include_synthetic } => {
            match ledger.pop_next_task(include_synthetic).await? {
                Some(task) => {
                    println!("Claimed {}", task.id);
                    print_task(&task);
                }
                None => println!("Task queue is empty."),
            }
        }
        TaskCommand::List { status, limit } => {
            let tasks = ledger.list_tasks(status, limit).await?;
            if tasks.is_empty() {
                println!("No tasks.");
            } else {
                let rows = tasks
                    .iter()
                    .map(|task| {
                        vec![
                            task.id.clone(),
                            task.status.to_string(),
                            truncate(&task.title, 48),
                            or_dash(task.meta.owner_agent.as_deref()),
                            hold_marker(task),
                            task.updated_at.clone(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "STATUS", "TITLE", "OWNER", "HOLD", "UPDATED"], rows);
            }
        }
        TaskCommand::Show { task_id } => {
            let task = ledger
                .get_task(&task_id)
                .await?
                .with_context(|| format!("No task {}", task_id))?;
            print_task(&task);
        }
        TaskCommand::Close {
            task_id,
            by,
            reason,
            artifact,
        } => {
            let task = ledger
                .close_task(&task_id, &by, &reason, artifact.as_deref())
                .await?;
            println!("Closed {} ({})", task.id, task.status);
        }
        TaskCommand::StopLoss {
            task_id,
            reason,
            step,
            failure,
        } => {
            let task = ledger
                .trigger_stop_loss(&task_id, &reason, &step, failure)
                .await?;
            println!("Stop-loss set on {} ({})", task.id, task.status);
            println!("  Human review required before it moves again.");
        }
        TaskCommand::PolicyGate { task_id, reason } => {
            let task = ledger.trigger_policy_gate(&task_id, &reason).await?;
            println!("Policy gate set on {} ({})", task.id, task.status);
            println!("  Human review required before it moves again.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn hold_marker(task: &TaskRecord) -> String {
    if task.meta.review_rejected {
        "rejected".to_string()
    } else if task.meta.policy_gate_triggered {
        "policy-gate".to_string()
    } else if task.meta.stop_loss_triggered {
        "stop-loss".to_string()
    } else {
        "-".to_string()
    }
}

fn print_task(task: &TaskRecord) {
    println!("Task {}", task.id);
    println!("  Session:  {}", task.session_id);
    println!("  Status:   {}", task.status);
    println!("  Title:    {}", task.title);
    if let Some(detail) = &task.detail {
        println!("  Detail:   {}", detail);
    }
    println!("  Created:  {}", task.created_at);
    println!("  Updated:  {}", task.updated_at);
    if let Some(owner) = &task.meta.owner_agent {
        println!("  Owner:    {}", owner);
    }
    if task.meta.stop_loss_triggered {
        println!(
            "  Stop-loss: {} at step '{}' ({})",
            or_dash(task.meta.stop_loss_reason.as_deref()),
            or_dash(task.meta.stop_loss_step.as_deref()),
            task.meta
                .stop_loss_failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    if task.meta.policy_gate_triggered {
        println!(
            "  Policy gate: {}",
            or_dash(task.meta.policy_gate_reason.as_deref())
        );
    }
    if task.meta.review_rejected {
        println!(
            "  Review:   rejected by {}",
            or_dash(task.meta.review_rejected_by.as_deref())
        );
    } else if task.meta.stop_loss_retry_approved {
        println!(
            "  Review:   retry approved by {}",
            or_dash(task.meta.retry_approved_by.as_deref())
        );
    }
    if let Some(closed_by) = &task.meta.closed_by {
        println!(
            "  Closed:   by {} ({})",
            closed_by,
            or_dash(task.meta.close_reason.as_deref())
        );
    }
}
