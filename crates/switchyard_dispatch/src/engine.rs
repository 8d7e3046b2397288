//! The dispatch engine.
//!
//! One `dispatch` call takes a validated request all the way through gate
//! enforcement, governance checks, the generate/validate/repair loop, and
//! the atomic ledger commit. Nothing is written for a denied request, and
//! nothing is written for a generation until its output validates.

use crate::error::DispatchError;
use crate::parse::parse_and_validate;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use switchyard_agent::{
    build_repair_prompt, build_system_prompt, build_user_prompt, AgentError, GenerationAgent,
};
use switchyard_contract::ContractStore;
use switchyard_ledger::{ActionRecord, ArtifactRecord, DecisionRecord, Ledger, TaskMeta, TaskRecord};
use switchyard_protocol::{
    no_flags_beyond_external_comms, ActionKind, DecisionKind, DispatchOutcome, DispatchReport,
    DispatchState, GateDecision, OutcomeMeta, RouteDecision, WorkRequest,
};
use switchyard_routing::route_request;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Budget for each generation call. Expiry is a hard fault, not retried.
    pub generation_timeout: Duration,
    /// Opt-in: let draft-only intents through a governance hold when no risk
    /// flag beyond `external_comms` is set.
    pub draft_only_auto_allow: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(60),
            draft_only_auto_allow: false,
        }
    }
}

pub struct DispatchEngine {
    ledger: Ledger,
    contracts: ContractStore,
    agent: Arc<dyn GenerationAgent>,
    options: DispatchOptions,
}

impl DispatchEngine {
    pub fn new(
        ledger: Ledger,
        contracts: ContractStore,
        agent: Arc<dyn GenerationAgent>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            ledger,
            contracts,
            agent,
            options,
        }
    }

    /// Run one request through the full dispatch pipeline.
    ///
    /// `override_requested` is the caller asking to use a previously
    /// recorded override approval; it never creates one.
    pub async fn dispatch(
        &self,
        request: &WorkRequest,
        override_requested: bool,
    ) -> Result<DispatchReport, DispatchError> {
        let route = route_request(request);

        // Denied requests leave no trace beyond the caller's own logs.
        if route.gate_decision == GateDecision::Deny {
            info!(request_id = %request.request_id, "Request denied by gate");
            let outcome = DispatchOutcome::new(
                DispatchState::Rejected,
                route
                    .gate_reason
                    .clone()
                    .unwrap_or_else(|| "denied by gate".to_string()),
                "Rephrase the request without the denied phrasing and resubmit.",
            );
            return Ok(DispatchReport::new(
                &request.request_id,
                &request.session_id,
                &route,
                &outcome,
            ));
        }

        self.ledger
            .ensure_session(&request.session_id, request.initiator)
            .await?;

        let route_action = ActionRecord::new(&request.session_id, ActionKind::Route)
            .with_request(&request.request_id)
            .with_intent(route.intent)
            .with_payload(json!({
                "primary_agent": route.primary_agent,
                "defaulted": route.defaulted,
                "governance_required": route.governance_required,
                "gate_decision": route.gate_decision.as_str(),
                "gate_flags": route.gate_flags,
                "gate_reason": route.gate_reason,
            }));

        // Blocked and flagged routes get a paired defer decision.
        let defer = if matches!(
            route.gate_decision,
            GateDecision::Blocked | GateDecision::ApproveWithFlag
        ) {
            let subject = format!("dispatch_gate:{}", request.request_id);
            let mut decision =
                DecisionRecord::new(&request.session_id, DecisionKind::Defer, &subject, "gate")
                    .with_action(&route_action.id);
            if let Some(reason) = &route.gate_reason {
                decision = decision.with_reason(reason);
            }
            Some(decision)
        } else {
            None
        };
        self.ledger.record_route(&route_action, defer.as_ref()).await?;

        if route.gate_decision == GateDecision::Blocked {
            info!(request_id = %request.request_id, "Request blocked by hard risk flags");
            let outcome = DispatchOutcome::new(
                DispatchState::Blocked,
                route
                    .gate_reason
                    .clone()
                    .unwrap_or_else(|| "blocked by gate".to_string()),
                "Clear the blocking risk flags and submit a new request.",
            );
            return Ok(DispatchReport::new(
                &request.request_id,
                &request.session_id,
                &route,
                &outcome,
            ));
        }

        let mut meta = OutcomeMeta::default();
        if route.governance_required {
            let mut admitted = false;

            if override_requested {
                let approved = match self
                    .ledger
                    .has_override_approval(&request.session_id, route.intent)
                    .await
                {
                    Ok(found) => found,
                    // Fail closed: an unreadable ledger is no approval.
                    Err(e) => {
                        warn!(error = %e, "Override lookup failed; treating as unapproved");
                        false
                    }
                };
                if approved {
                    admitted = true;
                } else {
                    meta.override_denied = true;
                }
            }

            if !admitted && self.draft_only_bypass(&route, request) {
                info!(
                    request_id = %request.request_id,
                    intent = %route.intent,
                    "Draft-only bypass admitted gated request"
                );
                meta.draft_only_bypass = true;
                admitted = true;
            }

            if !admitted {
                let (reason, next_step) = if meta.override_denied {
                    (
                        "Override requested but no approval exists for this session and intent",
                        "Ask an approver to record the override, then retry.",
                    )
                } else {
                    (
                        "Governance review required before dispatch",
                        "Record an override approval for this session and intent, then re-run with the override requested.",
                    )
                };
                let mut outcome = DispatchOutcome::new(DispatchState::Gated, reason, next_step);
                outcome.meta = meta;
                return Ok(DispatchReport::new(
                    &request.request_id,
                    &request.session_id,
                    &route,
                    &outcome,
                ));
            }
        }

        self.run_generation(request, &route, meta).await
    }

    /// Draft-only intents may pass a governance hold when the caller opted
    /// in and nothing beyond `external_comms` is flagged.
    fn draft_only_bypass(&self, route: &RouteDecision, request: &WorkRequest) -> bool {
        self.options.draft_only_auto_allow
            && route.intent.is_draft_only()
            && no_flags_beyond_external_comms(&request.risk_flags)
    }

    async fn run_generation(
        &self,
        request: &WorkRequest,
        route: &RouteDecision,
        mut meta: OutcomeMeta,
    ) -> Result<DispatchReport, DispatchError> {
        let contract = self.contracts.contract_for(&route.primary_agent)?;
        let system_prompt = build_system_prompt(contract);
        let user_prompt = build_user_prompt(request, route.intent);

        let mut errors: Vec<String> = Vec::new();

        let first = match self.generate(&system_prompt, &user_prompt).await {
            Ok(raw) => raw,
            Err(fault) => return self.record_fault(request, route, meta, fault).await,
        };

        let mut document: Option<Value> = None;
        match parse_and_validate(contract, &first) {
            Ok(doc) => document = Some(doc),
            Err(first_errors) => {
                debug!(
                    request_id = %request.request_id,
                    count = first_errors.len(),
                    "First attempt failed validation; repairing once"
                );
                errors.extend(first_errors);
                meta.repair_attempted = true;

                let repair_prompt = build_repair_prompt(&user_prompt, &first, &errors);
                let second = match self.generate(&system_prompt, &repair_prompt).await {
                    Ok(raw) => raw,
                    Err(fault) => return self.record_fault(request, route, meta, fault).await,
                };
                match parse_and_validate(contract, &second) {
                    Ok(doc) => {
                        meta.repair_succeeded = true;
                        document = Some(doc);
                    }
                    Err(second_errors) => errors.extend(second_errors),
                }
            }
        }

        match document {
            Some(doc) => self.commit(request, route, meta, doc).await,
            None => self.reject_for_contract(request, route, meta, errors).await,
        }
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        match tokio::time::timeout(
            self.options.generation_timeout,
            self.agent.generate(system_prompt, user_prompt),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.options.generation_timeout)),
        }
    }

    /// Artifact, optional follow-up task, and the dispatch action, committed
    /// in one ledger transaction.
    async fn commit(
        &self,
        request: &WorkRequest,
        route: &RouteDecision,
        mut meta: OutcomeMeta,
        doc: Value,
    ) -> Result<DispatchReport, DispatchError> {
        let action = ActionRecord::new(&request.session_id, ActionKind::Dispatch)
            .with_request(&request.request_id)
            .with_intent(route.intent)
            .with_state(DispatchState::Dispatched);

        let output = doc.get("outputs").and_then(|v| v.get(0));
        let (kind, title, content) = match output {
            Some(item) => (
                item.get("type").and_then(Value::as_str).unwrap_or("note"),
                item.get("title").and_then(Value::as_str),
                item.get("content").cloned().unwrap_or(Value::Null),
            ),
            // A contract without required outputs: keep the whole document.
            None => ("document", None, doc.clone()),
        };

        let mut artifact = ArtifactRecord::new(&request.session_id, &route.primary_agent, kind, content)
            .with_action(&action.id)
            .with_repaired(meta.repair_succeeded);
        if let Some(title) = title {
            artifact = artifact.with_title(title);
        }
        if let Some(level) = doc.get("classification").and_then(Value::as_str) {
            artifact = artifact.with_classification(level);
        }

        let task = doc
            .get("next_actions")
            .and_then(|v| v.get(0))
            .and_then(|item| {
                let title = item.get("title").and_then(Value::as_str)?;
                let task_meta = TaskMeta {
                    owner_agent: item
                        .get("owner_agent")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string()),
                    source_request_id: Some(request.request_id.clone()),
                    source_artifact_id: Some(artifact.id.clone()),
                    ..TaskMeta::default()
                };
                let mut task = TaskRecord::new(&request.session_id, title).with_meta(task_meta);
                if let Some(detail) = item.get("detail").and_then(Value::as_str) {
                    task = task.with_detail(detail);
                }
                Some(task)
            });

        meta.artifact_id = Some(artifact.id.clone());
        meta.task_id = task.as_ref().map(|t| t.id.clone());

        let action = action.with_payload(json!({
            "agent": route.primary_agent,
            "artifact_id": artifact.id,
            "task_id": meta.task_id,
            "repair_attempted": meta.repair_attempted,
            "repair_succeeded": meta.repair_succeeded,
            "override_denied": meta.override_denied,
            "draft_only_bypass": meta.draft_only_bypass,
        }));

        self.ledger
            .commit_dispatch(&action, &artifact, task.as_ref())
            .await?;

        info!(
            request_id = %request.request_id,
            agent = %route.primary_agent,
            artifact_id = %artifact.id,
            repaired = meta.repair_succeeded,
            "Dispatch committed"
        );

        let next_step = if meta.task_id.is_some() {
            "Review the artifact and work the follow-up task."
        } else {
            "Review the artifact."
        };
        let mut outcome = DispatchOutcome::new(
            DispatchState::Dispatched,
            "Generated document passed contract validation",
            next_step,
        )
        .with_agent(&route.primary_agent);
        outcome.meta = meta;
        Ok(DispatchReport::new(
            &request.request_id,
            &request.session_id,
            route,
            &outcome,
        ))
    }

    /// Both attempts failed validation: record the errors, leave no
    /// artifact or task.
    async fn reject_for_contract(
        &self,
        request: &WorkRequest,
        route: &RouteDecision,
        meta: OutcomeMeta,
        errors: Vec<String>,
    ) -> Result<DispatchReport, DispatchError> {
        let action = ActionRecord::new(&request.session_id, ActionKind::Dispatch)
            .with_request(&request.request_id)
            .with_intent(route.intent)
            .with_state(DispatchState::Rejected)
            .with_payload(json!({
                "agent": route.primary_agent,
                "errors": errors,
                "repair_attempted": meta.repair_attempted,
            }));
        self.ledger.record_action(&action).await?;

        warn!(
            request_id = %request.request_id,
            agent = %route.primary_agent,
            errors = errors.len(),
            "Dispatch rejected: output failed contract validation twice"
        );

        let mut outcome = DispatchOutcome::new(
            DispatchState::Rejected,
            "Output failed contract validation after one repair attempt",
            "Inspect the recorded errors and adjust the goal or the agent contract.",
        )
        .with_agent(&route.primary_agent);
        outcome.meta = meta;
        Ok(DispatchReport::new(
            &request.request_id,
            &request.session_id,
            route,
            &outcome,
        ))
    }

    /// Agent faults (timeout, spawn failure) become an explicit ERROR
    /// outcome with the fault on the dispatch action.
    async fn record_fault(
        &self,
        request: &WorkRequest,
        route: &RouteDecision,
        meta: OutcomeMeta,
        fault: AgentError,
    ) -> Result<DispatchReport, DispatchError> {
        let action = ActionRecord::new(&request.session_id, ActionKind::Dispatch)
            .with_request(&request.request_id)
            .with_intent(route.intent)
            .with_state(DispatchState::Error)
            .with_payload(json!({
                "agent": route.primary_agent,
                "fault": fault.to_string(),
            }));
        self.ledger.record_action(&action).await?;

        warn!(
            request_id = %request.request_id,
            agent = %route.primary_agent,
            fault = %fault,
            "Dispatch aborted by agent fault"
        );

        let mut outcome = DispatchOutcome::new(
            DispatchState::Error,
            format!("agent fault: {}", fault),
            "Check the agent configuration and retry.",
        )
        .with_agent(&route.primary_agent);
        outcome.meta = meta;
        Ok(DispatchReport::new(
            &request.request_id,
            &request.session_id,
            route,
            &outcome,
        ))
    }
}
