//! Task lifecycle: queue pop, stop-loss and policy-gate holds, human review.
//!
//! Every transition runs in one transaction against one task row and writes
//! its paired audit action before committing. Claiming uses the guarded
//! UPDATE ... WHERE status = 'todo' idiom so a lost race surfaces as `None`,
//! never as a double claim.

use crate::audit::{insert_action, insert_decision, insert_task_row};
use crate::error::{LedgerError, Result};
use crate::types::{ActionRecord, DecisionRecord, TaskMeta, TaskRecord};
use crate::Ledger;
use chrono::Utc;
use serde_json::json;
use sqlx::{Row, Sqlite, Transaction};
use std::fmt;
use std::str::FromStr;
use switchyard_protocol::{ActionKind, DecisionKind, FailureKind, TaskStatus};
use tracing::info;

/// Human-review verdict on a held task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    /// Approve one more attempt: task returns to `todo`.
    Retry,
    /// Close the task as resolved without re-running it.
    Close,
    /// Uphold the hold; the task stays blocked for good.
    Reject,
}

impl ReviewVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewVerdict::Retry => "retry",
            ReviewVerdict::Close => "close",
            ReviewVerdict::Reject => "reject",
        }
    }

    fn action_kind(&self) -> ActionKind {
        match self {
            ReviewVerdict::Retry => ActionKind::HumanReviewRetry,
            ReviewVerdict::Close => ActionKind::HumanReviewClose,
            ReviewVerdict::Reject => ActionKind::HumanReviewReject,
        }
    }
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReviewVerdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retry" => Ok(ReviewVerdict::Retry),
            "close" => Ok(ReviewVerdict::Close),
            "reject" => Ok(ReviewVerdict::Reject),
            _ => Err(format!(
                "Invalid review verdict: '{}'. Expected: retry, close, or reject",
                s
            )),
        }
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<TaskRecord> {
    let status_str: String = row.get("status");
    let status = status_str
        .parse()
        .map_err(|_| LedgerError::corrupt("status", status_str))?;

    let meta_raw: Option<String> = row.get("meta");
    let meta = TaskMeta::parse(meta_raw.as_deref())?;

    Ok(TaskRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        title: row.get("title"),
        detail: row.get("detail"),
        status,
        meta,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn fetch_task_tx(tx: &mut Transaction<'_, Sqlite>, task_id: &str) -> Result<TaskRecord> {
    let row = sqlx::query("SELECT * FROM sy_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?;

    match row {
        Some(row) => row_to_task(&row),
        None => Err(LedgerError::not_found(format!("task {}", task_id))),
    }
}

async fn update_task_tx(tx: &mut Transaction<'_, Sqlite>, task: &TaskRecord) -> Result<()> {
    sqlx::query("UPDATE sy_tasks SET status = ?, meta = ?, updated_at = ? WHERE id = ?")
        .bind(task.status.as_str())
        .bind(task.meta.to_json()?)
        .bind(&task.updated_at)
        .bind(&task.id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

impl Ledger {
    pub async fn insert_task(&self, task: &TaskRecord) -> Result<()> {
        insert_task_row(&self.pool, task).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let row = sqlx::query("SELECT * FROM sy_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_task).transpose()
    }

    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<TaskRecord>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT * FROM sy_tasks
                    WHERE status = ?
                    ORDER BY created_at ASC, id ASC
                    LIMIT ?
                    "#,
                )
                .bind(status.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM sy_tasks ORDER BY created_at ASC, id ASC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_task).collect()
    }

    /// Atomically claim the oldest `todo` task and move it to `doing`.
    ///
    /// Synthetic (seeded) tasks are skipped unless `include_synthetic` is
    /// set. Returns `None` when the queue is empty or the claim lost a race.
    pub async fn pop_next_task(&self, include_synthetic: bool) -> Result<Option<TaskRecord>> {
        let mut tx = self.pool.begin().await?;

        let sql = if include_synthetic {
            r#"
            SELECT id FROM sy_tasks
            WHERE status = 'todo'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        } else {
            r#"
            SELECT id FROM sy_tasks
            WHERE status = 'todo'
              AND COALESCE(json_extract(meta, '$.synthetic'), 0) = 0
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        };

        let task_id: Option<String> = sqlx::query_scalar(sql).fetch_optional(&mut *tx).await?;

        let Some(task_id) = task_id else {
            tx.commit().await?;
            return Ok(None);
        };

        let now = Utc::now().to_rfc3339();
        let rows_affected = sqlx::query(
            r#"
            UPDATE sy_tasks
            SET status = 'doing', updated_at = ?
            WHERE id = ? AND status = 'todo'
            "#,
        )
        .bind(&now)
        .bind(&task_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            // Claimed by someone else between select and update
            tx.commit().await?;
            return Ok(None);
        }

        let task = fetch_task_tx(&mut tx, &task_id).await?;

        let action = ActionRecord::new(&task.session_id, ActionKind::TaskNext)
            .with_payload(json!({ "task_id": task.id, "title": task.title }));
        insert_action(&mut *tx, &action).await?;

        tx.commit().await?;
        info!(task_id = %task.id, "Task claimed");

        Ok(Some(task))
    }

    /// Hold a task after a failed attempt. Errors if the stop-loss already
    /// fired; a completed task cannot be held.
    pub async fn trigger_stop_loss(
        &self,
        task_id: &str,
        reason: &str,
        step: &str,
        failure: FailureKind,
    ) -> Result<TaskRecord> {
        let mut tx = self.pool.begin().await?;
        let mut task = fetch_task_tx(&mut tx, task_id).await?;

        if task.meta.stop_loss_triggered {
            return Err(LedgerError::StopLossAlreadyTriggered(task.id));
        }
        if task.status == TaskStatus::Done {
            return Err(LedgerError::InvalidTaskState {
                task_id: task.id,
                status: task.status,
                attempted: "trigger stop-loss",
            });
        }

        let now = Utc::now().to_rfc3339();
        task.status = TaskStatus::Blocked;
        task.meta.stop_loss_triggered = true;
        task.meta.stop_loss_reason = Some(reason.to_string());
        task.meta.stop_loss_step = Some(step.to_string());
        task.meta.stop_loss_failure = Some(failure);
        task.meta.stop_loss_at = Some(now.clone());
        task.meta.hil_required = true;
        task.updated_at = now;

        update_task_tx(&mut tx, &task).await?;

        let action = ActionRecord::new(&task.session_id, ActionKind::StopLoss).with_payload(json!({
            "task_id": task.id,
            "reason": reason,
            "step": step,
            "failure": failure.as_str(),
        }));
        insert_action(&mut *tx, &action).await?;

        tx.commit().await?;
        info!(task_id = %task.id, failure = %failure, "Stop-loss triggered");

        Ok(task)
    }

    /// Pre-execution hold. Sets the policy-gate marker and the stop-loss
    /// hold fields so the task enters the same review funnel. Calling it
    /// again on an already-gated task succeeds without changing anything.
    pub async fn trigger_policy_gate(&self, task_id: &str, reason: &str) -> Result<TaskRecord> {
        let mut tx = self.pool.begin().await?;
        let mut task = fetch_task_tx(&mut tx, task_id).await?;

        if task.meta.policy_gate_triggered {
            tx.commit().await?;
            return Ok(task);
        }
        if task.status == TaskStatus::Done {
            return Err(LedgerError::InvalidTaskState {
                task_id: task.id,
                status: task.status,
                attempted: "trigger a policy gate",
            });
        }

        let now = Utc::now().to_rfc3339();
        task.status = TaskStatus::Blocked;
        task.meta.policy_gate_triggered = true;
        task.meta.policy_gate_reason = Some(reason.to_string());
        task.meta.policy_gate_at = Some(now.clone());
        task.meta.hil_required = true;
        if !task.meta.stop_loss_triggered {
            task.meta.stop_loss_triggered = true;
            task.meta.stop_loss_reason = Some(reason.to_string());
            task.meta.stop_loss_failure = Some(FailureKind::PolicyGate);
            task.meta.stop_loss_at = Some(now.clone());
        }
        task.updated_at = now;

        update_task_tx(&mut tx, &task).await?;

        let action = ActionRecord::new(&task.session_id, ActionKind::PolicyGate)
            .with_payload(json!({ "task_id": task.id, "reason": reason }));
        insert_action(&mut *tx, &action).await?;

        tx.commit().await?;
        info!(task_id = %task.id, "Policy gate triggered");

        Ok(task)
    }

    /// Apply a human-review verdict to a held task.
    ///
    /// Requires `blocked` status with the stop-loss hold set. A rejected
    /// review is terminal: every later verdict on the task is refused.
    pub async fn human_review(
        &self,
        task_id: &str,
        verdict: ReviewVerdict,
        reviewer: &str,
        reason: Option<&str>,
        artifact_id: Option<&str>,
    ) -> Result<TaskRecord> {
        let mut tx = self.pool.begin().await?;
        let mut task = fetch_task_tx(&mut tx, task_id).await?;

        if task.meta.review_rejected {
            return Err(LedgerError::ReviewRejected(task.id));
        }
        if !task.is_reviewable() {
            return Err(LedgerError::NotReviewable {
                task_id: task.id.clone(),
                reason: format!(
                    "status is '{}' and stop-loss triggered is {}",
                    task.status, task.meta.stop_loss_triggered
                ),
            });
        }

        let now = Utc::now().to_rfc3339();
        let mut decision: Option<DecisionRecord> = None;

        match verdict {
            ReviewVerdict::Retry => {
                if task.meta.stop_loss_retry_approved {
                    return Err(LedgerError::RetryAlreadyApproved(task.id));
                }
                task.status = TaskStatus::Todo;
                task.meta.stop_loss_retry_approved = true;
                task.meta.retry_approved_by = Some(reviewer.to_string());
                task.meta.retry_approved_at = Some(now.clone());

                let mut d = DecisionRecord::new(
                    &task.session_id,
                    DecisionKind::Approve,
                    &format!("task_retry:{}", task.id),
                    reviewer,
                );
                if let Some(reason) = reason {
                    d = d.with_reason(reason);
                }
                decision = Some(d);
            }
            ReviewVerdict::Close => {
                task.status = TaskStatus::Done;
                task.meta.closed_by = Some(reviewer.to_string());
                task.meta.closed_at = Some(now.clone());
                task.meta.close_reason = reason.map(str::to_string);
                task.meta.close_artifact_id = artifact_id.map(str::to_string);
            }
            ReviewVerdict::Reject => {
                task.meta.review_rejected = true;
                task.meta.review_rejected_by = Some(reviewer.to_string());
                task.meta.review_rejected_at = Some(now.clone());

                let mut d = DecisionRecord::new(
                    &task.session_id,
                    DecisionKind::Reject,
                    &format!("task_review:{}", task.id),
                    reviewer,
                );
                if let Some(reason) = reason {
                    d = d.with_reason(reason);
                }
                decision = Some(d);
            }
        }
        task.updated_at = now;

        update_task_tx(&mut tx, &task).await?;

        let action =
            ActionRecord::new(&task.session_id, verdict.action_kind()).with_payload(json!({
                "task_id": task.id,
                "reviewer": reviewer,
                "reason": reason,
            }));
        if let Some(ref mut d) = decision {
            d.action_id = Some(action.id.clone());
            insert_decision(&mut *tx, d).await?;
        }
        insert_action(&mut *tx, &action).await?;

        tx.commit().await?;
        info!(task_id = %task.id, verdict = %verdict, reviewer, "Human review applied");

        Ok(task)
    }

    /// Ordinary closure of a claimed task. Only `doing` tasks qualify; a
    /// never-popped task cannot be closed this way.
    pub async fn close_task(
        &self,
        task_id: &str,
        closed_by: &str,
        reason: &str,
        artifact_id: Option<&str>,
    ) -> Result<TaskRecord> {
        let mut tx = self.pool.begin().await?;
        let mut task = fetch_task_tx(&mut tx, task_id).await?;

        if task.status != TaskStatus::Doing {
            return Err(LedgerError::InvalidTaskState {
                task_id: task.id,
                status: task.status,
                attempted: "close",
            });
        }

        let now = Utc::now().to_rfc3339();
        task.status = TaskStatus::Done;
        task.meta.closed_by = Some(closed_by.to_string());
        task.meta.closed_at = Some(now.clone());
        task.meta.close_reason = Some(reason.to_string());
        task.meta.close_artifact_id = artifact_id.map(str::to_string);
        task.updated_at = now;

        update_task_tx(&mut tx, &task).await?;

        let action = ActionRecord::new(&task.session_id, ActionKind::TaskClose).with_payload(
            json!({ "task_id": task.id, "closed_by": closed_by, "reason": reason }),
        );
        insert_action(&mut *tx, &action).await?;

        tx.commit().await?;
        info!(task_id = %task.id, closed_by, "Task closed");

        Ok(task)
    }
}
