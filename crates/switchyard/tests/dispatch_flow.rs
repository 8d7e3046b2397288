//! End-to-end dispatch scenarios: routing, the governance gate, generation
//! and the ledger working together against a real on-disk database.

use std::sync::Arc;

use serde_json::{json, Value};
use switchyard_agent::ScriptedAgent;
use switchyard_contract::ContractStore;
use switchyard_dispatch::{DispatchEngine, DispatchOptions};
use switchyard_ledger::Ledger;
use switchyard_protocol::{
    validate_request, ActionKind, DecisionKind, DispatchState, GateDecision, Intent, TaskStatus,
    WorkRequest, RISK_EXTERNAL_COMMS,
};
use tempfile::TempDir;

async fn open_ledger(dir: &TempDir) -> Ledger {
    Ledger::open(dir.path().join("ledger.sqlite3")).await.unwrap()
}

fn engine(ledger: &Ledger, agent: ScriptedAgent) -> DispatchEngine {
    DispatchEngine::new(
        ledger.clone(),
        ContractStore::builtin(),
        Arc::new(agent),
        DispatchOptions::default(),
    )
}

/// Build a request the way a CLI caller would: from a raw JSON document.
fn request(id: &str, session: &str, goal: &str, risk_flags: Value) -> WorkRequest {
    let doc = json!({
        "request_id": id,
        "session_id": session,
        "timestamp": "2026-02-10T09:00:00Z",
        "initiator": "user",
        "user_goal": goal,
        "constraints": {
            "no_public_exposure": true,
            "structured_outputs_only": true,
            "on_demand_only": true
        },
        "risk_flags": risk_flags
    });
    validate_request(&doc).unwrap()
}

#[tokio::test]
async fn test_plan_request_dispatches_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let engine = engine(&ledger, ScriptedAgent::default_valid());

    let req = request("req-q1", "sess-e2e-1", "Plan Q1 roadmap", json!({}));
    let report = engine.dispatch(&req, false).await.unwrap();

    assert_eq!(report.route.intent, Intent::PlanWork);
    assert_eq!(report.route.primary_agent, "planner");
    assert_eq!(report.route.gate_decision, GateDecision::Approve);
    assert_eq!(report.status, DispatchState::Dispatched);

    let artifact_id = report.dispatch.artifact_id.clone().unwrap();
    let artifact = ledger.get_artifact(&artifact_id).await.unwrap().unwrap();
    assert_eq!(artifact.agent, "planner");
    assert!(!artifact.repaired);

    let task_id = report.dispatch.task_id.clone().unwrap();
    let task = ledger.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.meta.source_request_id.as_deref(), Some("req-q1"));
    assert_eq!(
        task.meta.source_artifact_id.as_deref(),
        Some(artifact_id.as_str())
    );
}

#[tokio::test]
async fn test_denied_outreach_writes_no_ledger_rows() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let engine = engine(&ledger, ScriptedAgent::default_valid());

    let req = request(
        "req-deny",
        "sess-e2e-2",
        "send email to external clients",
        json!({}),
    );
    let report = engine.dispatch(&req, false).await.unwrap();

    assert_eq!(report.status, DispatchState::Rejected);
    assert_eq!(report.route.gate_decision, GateDecision::Deny);
    assert!(report.dispatch.artifact_id.is_none());

    // No session, no action, no decision: the ledger never heard about it.
    assert!(ledger.list_sessions(10).await.unwrap().is_empty());
    assert!(ledger.list_actions(None, 10).await.unwrap().is_empty());
    assert!(ledger.list_decisions(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_flagged_sales_request_gates_until_override_approved() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let engine = engine(&ledger, ScriptedAgent::default_valid());

    let req = request(
        "req-sales-1",
        "sess-e2e-3",
        "prepare outreach for the new leads",
        json!({ "external_comms": true }),
    );
    let gated = engine.dispatch(&req, false).await.unwrap();

    assert_eq!(gated.route.intent, Intent::SalesInternal);
    assert_eq!(gated.route.gate_decision, GateDecision::ApproveWithFlag);
    assert_eq!(gated.route.gate_flags, vec![RISK_EXTERNAL_COMMS.to_string()]);
    assert_eq!(gated.status, DispatchState::Gated);
    assert!(gated.dispatch.artifact_id.is_none());

    // An approver records the override; the retry sails through.
    ledger
        .record_override_approval(
            "sess-e2e-3",
            Intent::SalesInternal,
            "casey",
            Some("reviewed the lead list"),
        )
        .await
        .unwrap();

    let retry = request(
        "req-sales-2",
        "sess-e2e-3",
        "prepare outreach for the new leads",
        json!({ "external_comms": true }),
    );
    let dispatched = engine.dispatch(&retry, true).await.unwrap();

    assert_eq!(dispatched.status, DispatchState::Dispatched);
    assert!(!dispatched.dispatch.override_denied);
    assert!(dispatched.dispatch.artifact_id.is_some());
}

#[tokio::test]
async fn test_hard_risk_flag_blocks_despite_approved_override() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let engine = engine(&ledger, ScriptedAgent::default_valid());

    ledger
        .record_override_approval("sess-e2e-4", Intent::PlanWork, "casey", Some("attempted"))
        .await
        .unwrap();

    let req = request(
        "req-arch",
        "sess-e2e-4",
        "plan the database migration",
        json!({ "architecture_change": true }),
    );
    let report = engine.dispatch(&req, true).await.unwrap();

    assert_eq!(report.status, DispatchState::Blocked);
    assert_eq!(report.route.gate_decision, GateDecision::Blocked);
    assert!(report.dispatch.artifact_id.is_none());

    // The refusal is on the record: one route action with its defer decision.
    let actions = ledger.list_actions(Some("sess-e2e-4"), 10).await.unwrap();
    let routes: Vec<_> = actions.iter().filter(|a| a.kind == ActionKind::Route).collect();
    assert_eq!(routes.len(), 1);

    let decisions = ledger.list_decisions(Some("sess-e2e-4"), 10).await.unwrap();
    assert!(decisions.iter().any(|d| d.kind == DecisionKind::Defer));

    // But nothing was generated.
    assert!(ledger
        .list_artifacts(Some("sess-e2e-4"), 10)
        .await
        .unwrap()
        .is_empty());
    assert!(ledger.list_tasks(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_double_contract_failure_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;

    // Both attempts miss the required summary field.
    let bad = json!({
        "classification": "internal",
        "outputs": [{"type": "note", "title": "Offsite", "content": "Agenda draft"}]
    });
    let engine = engine(
        &ledger,
        ScriptedAgent::new(vec![bad.to_string(), bad.to_string()]),
    );

    let req = request("req-bad", "sess-e2e-5", "Plan the offsite", json!({}));
    let report = engine.dispatch(&req, false).await.unwrap();

    assert_eq!(report.status, DispatchState::Rejected);
    assert!(report.dispatch.repair_attempted);
    assert!(!report.dispatch.repair_succeeded);
    assert!(report.dispatch.artifact_id.is_none());
    assert!(report.dispatch.task_id.is_none());

    assert!(ledger
        .list_artifacts(Some("sess-e2e-5"), 10)
        .await
        .unwrap()
        .is_empty());
    assert!(ledger.list_tasks(None, 10).await.unwrap().is_empty());

    // The rejection itself is recorded.
    let actions = ledger.list_actions(Some("sess-e2e-5"), 10).await.unwrap();
    assert!(actions
        .iter()
        .any(|a| a.state == Some(DispatchState::Rejected)));
}

#[tokio::test]
async fn test_repaired_artifact_is_marked_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;

    let bad = json!({
        "classification": "internal",
        "outputs": [{"type": "note", "title": "Plan", "content": "First cut"}]
    });
    let good = json!({
        "summary": "Sprint plan for the next two weeks.",
        "classification": "internal",
        "outputs": [{"type": "plan", "title": "Sprint plan", "content": "Week one and week two."}]
    });
    let engine = engine(
        &ledger,
        ScriptedAgent::new(vec![bad.to_string(), good.to_string()]),
    );

    let req = request("req-repair", "sess-e2e-6", "plan the sprint", json!({}));
    let report = engine.dispatch(&req, false).await.unwrap();

    assert_eq!(report.status, DispatchState::Dispatched);
    assert!(report.dispatch.repair_attempted);
    assert!(report.dispatch.repair_succeeded);
    // The repaired document has no next_actions, so no task is seeded.
    assert!(report.dispatch.task_id.is_none());

    let artifact_id = report.dispatch.artifact_id.clone().unwrap();
    let artifact = ledger.get_artifact(&artifact_id).await.unwrap().unwrap();
    assert!(artifact.repaired);
    assert_eq!(artifact.content["summary"], "Sprint plan for the next two weeks.");
}
