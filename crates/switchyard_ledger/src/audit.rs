//! Session, action, decision and artifact operations.
//!
//! Writes that must land together (route bookkeeping, dispatch commits,
//! override approvals) run in a single transaction; partial ledger state is
//! a correctness violation, not a recoverable condition.

use crate::error::{LedgerError, Result};
use crate::types::{
    override_subject, ActionRecord, ArtifactRecord, DecisionRecord, SessionRecord, TaskRecord,
};
use crate::Ledger;
use chrono::Utc;
use sqlx::{Row, Sqlite};
use switchyard_protocol::{DecisionKind, Initiator, Intent, SessionStatus};
use tracing::info;

pub(crate) async fn insert_action<'e, E>(executor: E, action: &ActionRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let payload_json = action
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO sy_actions (id, session_id, request_id, kind, intent, state, payload, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&action.id)
    .bind(&action.session_id)
    .bind(&action.request_id)
    .bind(action.kind.as_str())
    .bind(action.intent.map(|i| i.as_str()))
    .bind(action.state.map(|s| s.as_str()))
    .bind(payload_json)
    .bind(&action.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn insert_decision<'e, E>(executor: E, decision: &DecisionRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sy_decisions (id, session_id, action_id, kind, subject, reason, decided_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&decision.id)
    .bind(&decision.session_id)
    .bind(&decision.action_id)
    .bind(decision.kind.as_str())
    .bind(&decision.subject)
    .bind(&decision.reason)
    .bind(&decision.decided_by)
    .bind(&decision.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn insert_artifact_row<'e, E>(executor: E, artifact: &ArtifactRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let content_json = serde_json::to_string(&artifact.content)?;

    sqlx::query(
        r#"
        INSERT INTO sy_artifacts (id, session_id, action_id, agent, kind, title, content, classification, repaired, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&artifact.id)
    .bind(&artifact.session_id)
    .bind(&artifact.action_id)
    .bind(&artifact.agent)
    .bind(&artifact.kind)
    .bind(&artifact.title)
    .bind(content_json)
    .bind(&artifact.classification)
    .bind(artifact.repaired as i64)
    .bind(&artifact.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn insert_task_row<'e, E>(executor: E, task: &TaskRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let meta_json = task.meta.to_json()?;

    sqlx::query(
        r#"
        INSERT INTO sy_tasks (id, session_id, title, detail, status, meta, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.id)
    .bind(&task.session_id)
    .bind(&task.title)
    .bind(&task.detail)
    .bind(task.status.as_str())
    .bind(meta_json)
    .bind(&task.created_at)
    .bind(&task.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord> {
    let initiator_str: String = row.get("initiator");
    let initiator = initiator_str
        .parse::<Initiator>()
        .map_err(|_| LedgerError::corrupt("initiator", initiator_str))?;
    let status_str: String = row.get("status");
    let status = status_str
        .parse::<SessionStatus>()
        .map_err(|_| LedgerError::corrupt("status", status_str))?;

    Ok(SessionRecord {
        id: row.get("id"),
        initiator,
        status,
        created_at: row.get("created_at"),
        last_active_at: row.get("last_active_at"),
        request_count: row.get("request_count"),
    })
}

fn row_to_action(row: &sqlx::sqlite::SqliteRow) -> Result<ActionRecord> {
    let kind_str: String = row.get("kind");
    let kind: switchyard_protocol::ActionKind = kind_str
        .parse()
        .map_err(|_| LedgerError::corrupt("kind", kind_str))?;

    let intent: Option<Intent> = match row.get::<Option<String>, _>("intent") {
        Some(s) => Some(s.parse().map_err(|_| LedgerError::corrupt("intent", s))?),
        None => None,
    };
    let state: Option<switchyard_protocol::DispatchState> =
        match row.get::<Option<String>, _>("state") {
            Some(s) => Some(s.parse().map_err(|_| LedgerError::corrupt("state", s))?),
            None => None,
        };
    let payload: Option<serde_json::Value> = match row.get::<Option<String>, _>("payload") {
        Some(s) => Some(serde_json::from_str(&s)?),
        None => None,
    };

    Ok(ActionRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        request_id: row.get("request_id"),
        kind,
        intent,
        state,
        payload,
        created_at: row.get("created_at"),
    })
}

fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionRecord> {
    let kind_str: String = row.get("kind");
    let kind = kind_str
        .parse()
        .map_err(|_| LedgerError::corrupt("kind", kind_str))?;

    Ok(DecisionRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        action_id: row.get("action_id"),
        kind,
        subject: row.get("subject"),
        reason: row.get("reason"),
        decided_by: row.get("decided_by"),
        created_at: row.get("created_at"),
    })
}

fn row_to_artifact(row: &sqlx::sqlite::SqliteRow) -> Result<ArtifactRecord> {
    let content_str: String = row.get("content");
    let content = serde_json::from_str(&content_str)?;
    let repaired: i64 = row.get("repaired");

    Ok(ArtifactRecord {
        id: row.get("id"),
        session_id: row.get("session_id"),
        action_id: row.get("action_id"),
        agent: row.get("agent"),
        kind: row.get("kind"),
        title: row.get("title"),
        content,
        classification: row.get("classification"),
        repaired: repaired != 0,
        created_at: row.get("created_at"),
    })
}

impl Ledger {
    // ========================================================================
    // Sessions
    // ========================================================================

    /// Insert the session if absent and refresh its last-active timestamp.
    /// Sessions are never deleted.
    pub async fn ensure_session(&self, session_id: &str, initiator: Initiator) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO sy_sessions (id, initiator, status, created_at, last_active_at, request_count)
            VALUES (?, ?, 'open', ?, ?, 0)
            ON CONFLICT(id) DO UPDATE SET last_active_at = excluded.last_active_at
            "#,
        )
        .bind(session_id)
        .bind(initiator.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a session closed. The row and its history stay in place; only
    /// `status` changes.
    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE sy_sessions SET status = 'closed', last_active_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("session {}", session_id)));
        }

        info!(session_id, "Session closed");
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query("SELECT * FROM sy_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let rows = sqlx::query("SELECT * FROM sy_sessions ORDER BY last_active_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_session).collect()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub async fn record_action(&self, action: &ActionRecord) -> Result<()> {
        insert_action(&self.pool, action).await
    }

    /// Record a route action, bump the session request counter, and write an
    /// accompanying decision row when the gate produced one. One transaction.
    pub async fn record_route(
        &self,
        action: &ActionRecord,
        decision: Option<&DecisionRecord>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_action(&mut *tx, action).await?;
        if let Some(decision) = decision {
            insert_decision(&mut *tx, decision).await?;
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE sy_sessions SET request_count = request_count + 1, last_active_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(&action.session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_action(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        let row = sqlx::query("SELECT * FROM sy_actions WHERE id = ?")
            .bind(action_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_action).transpose()
    }

    pub async fn list_actions(
        &self,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ActionRecord>> {
        let rows = match session_id {
            Some(sid) => {
                sqlx::query(
                    r#"
                    SELECT * FROM sy_actions
                    WHERE session_id = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(sid)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM sy_actions ORDER BY created_at DESC, id DESC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_action).collect()
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    pub async fn record_decision(&self, decision: &DecisionRecord) -> Result<()> {
        insert_decision(&self.pool, decision).await
    }

    pub async fn list_decisions(
        &self,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>> {
        let rows = match session_id {
            Some(sid) => {
                sqlx::query(
                    r#"
                    SELECT * FROM sy_decisions
                    WHERE session_id = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(sid)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM sy_decisions ORDER BY created_at DESC, id DESC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_decision).collect()
    }

    // ========================================================================
    // Override approvals
    // ========================================================================

    /// True iff an `approve` decision exists for this session and intent.
    pub async fn has_override_approval(&self, session_id: &str, intent: Intent) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sy_decisions
            WHERE session_id = ? AND subject = ? AND kind = 'approve'
            "#,
        )
        .bind(session_id)
        .bind(override_subject(intent))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Record an override approval: the approve decision plus its audit
    /// action, in one transaction.
    pub async fn record_override_approval(
        &self,
        session_id: &str,
        intent: Intent,
        approved_by: &str,
        rationale: Option<&str>,
    ) -> Result<DecisionRecord> {
        self.ensure_session(session_id, Initiator::User).await?;

        let action = ActionRecord::new(session_id, switchyard_protocol::ActionKind::ApproveOverride)
            .with_intent(intent)
            .with_payload(serde_json::json!({
                "approved_by": approved_by,
                "rationale": rationale,
            }));

        let mut decision = DecisionRecord::new(
            session_id,
            DecisionKind::Approve,
            &override_subject(intent),
            approved_by,
        )
        .with_action(&action.id);
        if let Some(rationale) = rationale {
            decision = decision.with_reason(rationale);
        }

        let mut tx = self.pool.begin().await?;
        insert_action(&mut *tx, &action).await?;
        insert_decision(&mut *tx, &decision).await?;
        tx.commit().await?;

        info!(session_id, intent = %intent, approved_by, "Override approval recorded");
        Ok(decision)
    }

    // ========================================================================
    // Artifacts
    // ========================================================================

    pub async fn insert_artifact(&self, artifact: &ArtifactRecord) -> Result<()> {
        insert_artifact_row(&self.pool, artifact).await
    }

    pub async fn get_artifact(&self, artifact_id: &str) -> Result<Option<ArtifactRecord>> {
        let row = sqlx::query("SELECT * FROM sy_artifacts WHERE id = ?")
            .bind(artifact_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_artifact).transpose()
    }

    pub async fn list_artifacts(
        &self,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ArtifactRecord>> {
        let rows = match session_id {
            Some(sid) => {
                sqlx::query(
                    r#"
                    SELECT * FROM sy_artifacts
                    WHERE session_id = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(sid)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM sy_artifacts ORDER BY created_at DESC, id DESC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_artifact).collect()
    }

    // ========================================================================
    // Dispatch commit
    // ========================================================================

    /// Commit a successful dispatch: artifact, optional follow-up task, and
    /// the dispatch action land in ONE transaction. A failure leaves the
    /// ledger exactly as it was.
    pub async fn commit_dispatch(
        &self,
        action: &ActionRecord,
        artifact: &ArtifactRecord,
        task: Option<&TaskRecord>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_artifact_row(&mut *tx, artifact).await?;
        if let Some(task) = task {
            insert_task_row(&mut *tx, task).await?;
        }
        insert_action(&mut *tx, action).await?;

        tx.commit().await?;

        info!(
            artifact_id = %artifact.id,
            task_id = task.map(|t| t.id.as_str()).unwrap_or("-"),
            "Dispatch committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_protocol::{ActionKind, DispatchState};

    async fn setup() -> Ledger {
        Ledger::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_ensure_session_is_idempotent() {
        let ledger = setup().await;

        ledger.ensure_session("sess-1", Initiator::User).await.unwrap();
        ledger.ensure_session("sess-1", Initiator::User).await.unwrap();

        let sessions = ledger.list_sessions(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "sess-1");
        assert_eq!(sessions[0].initiator, Initiator::User);
        assert_eq!(sessions[0].status, SessionStatus::Open);
        assert_eq!(sessions[0].request_count, 0);
    }

    #[tokio::test]
    async fn test_close_session_flips_status_only() {
        let ledger = setup().await;
        ledger.ensure_session("sess-1", Initiator::User).await.unwrap();

        ledger.close_session("sess-1").await.unwrap();

        let session = ledger.get_session("sess-1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Closed);
        assert_eq!(session.request_count, 0);

        // Closing an unknown session is an error, not a silent no-op.
        let err = ledger.close_session("sess-missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_record_route_bumps_request_count() {
        let ledger = setup().await;
        ledger.ensure_session("sess-1", Initiator::User).await.unwrap();

        let action = ActionRecord::new("sess-1", ActionKind::Route)
            .with_request("req-1")
            .with_intent(Intent::PlanWork);
        ledger.record_route(&action, None).await.unwrap();

        let session = ledger.get_session("sess-1").await.unwrap().unwrap();
        assert_eq!(session.request_count, 1);

        let actions = ledger.list_actions(Some("sess-1"), 10).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Route);
        assert_eq!(actions[0].request_id.as_deref(), Some("req-1"));
        assert_eq!(actions[0].intent, Some(Intent::PlanWork));
    }

    #[tokio::test]
    async fn test_route_with_defer_decision() {
        let ledger = setup().await;
        ledger.ensure_session("sess-1", Initiator::User).await.unwrap();

        let action = ActionRecord::new("sess-1", ActionKind::Route)
            .with_state(DispatchState::Blocked);
        let decision = DecisionRecord::new("sess-1", DecisionKind::Defer, "route:req-9", "system")
            .with_action(&action.id)
            .with_reason("hard risk flag: deployment");
        ledger.record_route(&action, Some(&decision)).await.unwrap();

        let decisions = ledger.list_decisions(Some("sess-1"), 10).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, DecisionKind::Defer);
        assert_eq!(decisions[0].action_id.as_deref(), Some(action.id.as_str()));
    }

    #[tokio::test]
    async fn test_override_approval_roundtrip() {
        let ledger = setup().await;

        assert!(!ledger
            .has_override_approval("sess-1", Intent::OpsAutomation)
            .await
            .unwrap());

        ledger
            .record_override_approval("sess-1", Intent::OpsAutomation, "casey", Some("reviewed"))
            .await
            .unwrap();

        assert!(ledger
            .has_override_approval("sess-1", Intent::OpsAutomation)
            .await
            .unwrap());
        // Approval is scoped to the intent.
        assert!(!ledger
            .has_override_approval("sess-1", Intent::DraftContent)
            .await
            .unwrap());
        // And to the session.
        assert!(!ledger
            .has_override_approval("sess-2", Intent::OpsAutomation)
            .await
            .unwrap());

        let actions = ledger.list_actions(Some("sess-1"), 10).await.unwrap();
        assert_eq!(actions[0].kind, ActionKind::ApproveOverride);
    }

    #[tokio::test]
    async fn test_commit_dispatch_writes_all_rows() {
        let ledger = setup().await;
        ledger.ensure_session("sess-1", Initiator::User).await.unwrap();

        let action = ActionRecord::new("sess-1", ActionKind::Dispatch)
            .with_request("req-1")
            .with_state(DispatchState::Dispatched);
        let artifact = ArtifactRecord::new(
            "sess-1",
            "planner",
            "plan",
            serde_json::json!({"summary": "weekly plan"}),
        )
        .with_action(&action.id)
        .with_title("Weekly plan");
        let task = TaskRecord::new("sess-1", "Review the weekly plan");

        ledger
            .commit_dispatch(&action, &artifact, Some(&task))
            .await
            .unwrap();

        let stored = ledger.get_artifact(&artifact.id).await.unwrap().unwrap();
        assert_eq!(stored.agent, "planner");
        assert_eq!(stored.content["summary"], "weekly plan");
        assert!(!stored.repaired);

        let stored_task = ledger.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored_task.title, "Review the weekly plan");

        let actions = ledger.list_actions(Some("sess-1"), 10).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].state, Some(DispatchState::Dispatched));
    }
}
