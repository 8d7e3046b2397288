//! The task queue walked end to end on a real database: a dispatch seeds
//! the follow-up task, then queue pops, holds and review verdicts move it
//! through todo, doing, blocked and done.

use std::sync::Arc;

use serde_json::json;
use switchyard_agent::ScriptedAgent;
use switchyard_contract::ContractStore;
use switchyard_dispatch::{DispatchEngine, DispatchOptions};
use switchyard_ledger::{Ledger, LedgerError, ReviewVerdict};
use switchyard_protocol::{validate_request, DispatchState, FailureKind, TaskStatus};
use tempfile::TempDir;

async fn open_ledger(dir: &TempDir) -> Ledger {
    Ledger::open(dir.path().join("ledger.sqlite3")).await.unwrap()
}

/// Dispatch one clean planning request and return the id of the task it
/// seeded from the generated document's next action.
async fn dispatch_task(ledger: &Ledger, session: &str) -> String {
    let engine = DispatchEngine::new(
        ledger.clone(),
        ContractStore::builtin(),
        Arc::new(ScriptedAgent::default_valid()),
        DispatchOptions::default(),
    );

    let doc = json!({
        "request_id": format!("req-{}", session),
        "session_id": session,
        "timestamp": "2026-02-10T09:00:00Z",
        "initiator": "user",
        "user_goal": "Plan the week",
        "constraints": {
            "no_public_exposure": true,
            "structured_outputs_only": true,
            "on_demand_only": true
        }
    });
    let request = validate_request(&doc).unwrap();

    let report = engine.dispatch(&request, false).await.unwrap();
    assert_eq!(report.status, DispatchState::Dispatched);
    report.dispatch.task_id.unwrap()
}

#[tokio::test]
async fn test_dispatched_task_pops_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let task_id = dispatch_task(&ledger, "sess-life-1").await;

    let stored = ledger.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Todo);
    assert_eq!(stored.meta.owner_agent.as_deref(), Some("triage"));

    let claimed = ledger.pop_next_task(false).await.unwrap().unwrap();
    assert_eq!(claimed.id, task_id);
    assert_eq!(claimed.status, TaskStatus::Doing);

    let closed = ledger
        .close_task(&task_id, "casey", "reviewed the output", None)
        .await
        .unwrap();
    assert_eq!(closed.status, TaskStatus::Done);
    assert_eq!(closed.meta.closed_by.as_deref(), Some("casey"));
}

#[tokio::test]
async fn test_stop_loss_fires_once_then_guards() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let task_id = dispatch_task(&ledger, "sess-life-2").await;
    ledger.pop_next_task(false).await.unwrap();

    let held = ledger
        .trigger_stop_loss(
            &task_id,
            "two invalid generations",
            "generate",
            FailureKind::RepairFailed,
        )
        .await
        .unwrap();
    assert_eq!(held.status, TaskStatus::Blocked);
    assert!(held.meta.hil_required);

    let err = ledger
        .trigger_stop_loss(&task_id, "another failure", "commit", FailureKind::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::StopLossAlreadyTriggered(_)));

    // The guarded call changed nothing.
    let unchanged = ledger.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(unchanged.meta.stop_loss_reason, held.meta.stop_loss_reason);
    assert_eq!(unchanged.meta.stop_loss_at, held.meta.stop_loss_at);
    assert_eq!(unchanged.meta.stop_loss_step.as_deref(), Some("generate"));
    assert_eq!(
        unchanged.meta.stop_loss_failure,
        Some(FailureKind::RepairFailed)
    );
}

#[tokio::test]
async fn test_approved_retry_preserves_hold_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let task_id = dispatch_task(&ledger, "sess-life-3").await;
    ledger.pop_next_task(false).await.unwrap();

    let held = ledger
        .trigger_stop_loss(&task_id, "agent kept failing", "generate", FailureKind::Rejected)
        .await
        .unwrap();

    let reviewed = ledger
        .human_review(
            &task_id,
            ReviewVerdict::Retry,
            "casey",
            Some("one more attempt"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(reviewed.status, TaskStatus::Todo);
    assert!(reviewed.meta.stop_loss_retry_approved);
    assert_eq!(reviewed.meta.retry_approved_by.as_deref(), Some("casey"));

    // The original hold evidence survives the retry verbatim.
    assert!(reviewed.meta.stop_loss_triggered);
    assert_eq!(reviewed.meta.stop_loss_reason, held.meta.stop_loss_reason);
    assert_eq!(reviewed.meta.stop_loss_at, held.meta.stop_loss_at);

    // Back in the queue and claimable again.
    let claimed = ledger.pop_next_task(false).await.unwrap().unwrap();
    assert_eq!(claimed.id, task_id);
    assert_eq!(claimed.status, TaskStatus::Doing);
}

#[tokio::test]
async fn test_policy_gate_funnels_into_review_close() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let task_id = dispatch_task(&ledger, "sess-life-4").await;

    let held = ledger
        .trigger_policy_gate(&task_id, "external comms require signoff")
        .await
        .unwrap();
    assert_eq!(held.status, TaskStatus::Blocked);
    assert!(held.meta.policy_gate_triggered);
    assert_eq!(held.meta.stop_loss_failure, Some(FailureKind::PolicyGate));

    // Close straight from blocked; the task never passes through doing.
    let closed = ledger
        .human_review(
            &task_id,
            ReviewVerdict::Close,
            "casey",
            Some("handled offline"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(closed.status, TaskStatus::Done);
    assert_eq!(closed.meta.closed_by.as_deref(), Some("casey"));
    assert_eq!(closed.meta.close_reason.as_deref(), Some("handled offline"));
}

#[tokio::test]
async fn test_rejected_hold_is_permanent() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let task_id = dispatch_task(&ledger, "sess-life-5").await;
    ledger.pop_next_task(false).await.unwrap();

    ledger
        .trigger_stop_loss(&task_id, "unsafe output", "validate", FailureKind::Blocked)
        .await
        .unwrap();

    let rejected = ledger
        .human_review(
            &task_id,
            ReviewVerdict::Reject,
            "casey",
            Some("should never run"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, TaskStatus::Blocked);
    assert!(rejected.meta.review_rejected);

    for verdict in [ReviewVerdict::Retry, ReviewVerdict::Close] {
        let err = ledger
            .human_review(&task_id, verdict, "casey", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ReviewRejected(_)));
    }

    // And the queue no longer offers it.
    assert!(ledger.pop_next_task(false).await.unwrap().is_none());
}
