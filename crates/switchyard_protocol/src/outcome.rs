//! Route and dispatch outcome documents.
//!
//! `RouteDecision` is what the routing layer hands the dispatcher;
//! `DispatchOutcome` is the dispatcher's terminal result for one attempt;
//! `DispatchReport` is the combined JSON document printed for callers.

use crate::types::{DispatchState, GateDecision, Intent};
use serde::{Deserialize, Serialize};

/// Result of classification plus the governance gate, before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub intent: Intent,
    /// True when the fallback intent was assigned because no rule matched.
    #[serde(default)]
    pub defaulted: bool,
    pub primary_agent: String,
    #[serde(default)]
    pub secondary_agents: Vec<String>,
    pub governance_required: bool,
    pub gate_decision: GateDecision,
    /// Soft flags the gate accumulated, in evaluation order.
    #[serde(default)]
    pub gate_flags: Vec<String>,
    /// Human-readable reason when the gate did not plainly approve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_reason: Option<String>,
}

/// Bookkeeping attached to a dispatch outcome. Every field is recorded in
/// the ledger action payload so audits can replay the decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMeta {
    #[serde(default)]
    pub override_denied: bool,
    #[serde(default)]
    pub draft_only_bypass: bool,
    #[serde(default)]
    pub repair_attempted: bool,
    #[serde(default)]
    pub repair_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Terminal result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub state: DispatchState,
    /// Agent that produced the artifact, when one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub reason: String,
    /// Suggested operator follow-up, e.g. "approve the override and re-run".
    pub next_step: String,
    #[serde(default)]
    pub meta: OutcomeMeta,
}

impl DispatchOutcome {
    pub fn new(state: DispatchState, reason: impl Into<String>, next_step: impl Into<String>) -> Self {
        DispatchOutcome {
            state,
            agent: None,
            reason: reason.into(),
            next_step: next_step.into(),
            meta: OutcomeMeta::default(),
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Flattened route section of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub intent: Intent,
    pub defaulted: bool,
    pub primary_agent: String,
    pub secondary_agents: Vec<String>,
    pub requires_governance_review: bool,
    pub gate_decision: GateDecision,
    pub gate_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_reason: Option<String>,
}

/// Flattened dispatch section of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub state: DispatchState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub reason: String,
    pub next_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub override_denied: bool,
    pub draft_only_bypass: bool,
    pub repair_attempted: bool,
    pub repair_succeeded: bool,
}

/// The document printed by `switchyard route` and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Mirrors `dispatch.state` for quick scripting against the top level.
    pub status: DispatchState,
    pub request_id: String,
    pub session_id: String,
    pub route: RouteSummary,
    pub dispatch: DispatchSummary,
}

impl DispatchReport {
    pub fn new(
        request_id: impl Into<String>,
        session_id: impl Into<String>,
        route: &RouteDecision,
        outcome: &DispatchOutcome,
    ) -> Self {
        DispatchReport {
            status: outcome.state,
            request_id: request_id.into(),
            session_id: session_id.into(),
            route: RouteSummary {
                intent: route.intent,
                defaulted: route.defaulted,
                primary_agent: route.primary_agent.clone(),
                secondary_agents: route.secondary_agents.clone(),
                requires_governance_review: route.governance_required,
                gate_decision: route.gate_decision,
                gate_flags: route.gate_flags.clone(),
                gate_reason: route.gate_reason.clone(),
            },
            dispatch: DispatchSummary {
                state: outcome.state,
                agent: outcome.agent.clone(),
                reason: outcome.reason.clone(),
                next_step: outcome.next_step.clone(),
                artifact_id: outcome.meta.artifact_id.clone(),
                task_id: outcome.meta.task_id.clone(),
                override_denied: outcome.meta.override_denied,
                draft_only_bypass: outcome.meta.draft_only_bypass,
                repair_attempted: outcome.meta.repair_attempted,
                repair_succeeded: outcome.meta.repair_succeeded,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> RouteDecision {
        RouteDecision {
            intent: Intent::PlanWork,
            defaulted: false,
            primary_agent: "planner".to_string(),
            secondary_agents: vec!["researcher".to_string()],
            governance_required: false,
            gate_decision: GateDecision::Approve,
            gate_flags: vec![],
            gate_reason: None,
        }
    }

    #[test]
    fn test_report_mirrors_outcome_state() {
        let outcome = DispatchOutcome::new(
            DispatchState::Dispatched,
            "artifact committed",
            "review the artifact",
        )
        .with_agent("planner");
        let report = DispatchReport::new("req-1", "sess-1", &sample_route(), &outcome);
        assert_eq!(report.status, DispatchState::Dispatched);
        assert_eq!(report.dispatch.state, DispatchState::Dispatched);
        assert_eq!(report.dispatch.agent.as_deref(), Some("planner"));
    }

    #[test]
    fn test_report_json_shape() {
        let mut outcome = DispatchOutcome::new(
            DispatchState::Gated,
            "governance approval required",
            "record an override approval, then re-run",
        );
        outcome.meta.override_denied = true;
        let report = DispatchReport::new("req-2", "sess-2", &sample_route(), &outcome);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "GATED");
        assert_eq!(json["dispatch"]["override_denied"], true);
        assert_eq!(json["route"]["intent"], "PLAN_WORK");
        assert_eq!(json["route"]["requires_governance_review"], false);
        // Unset options stay out of the document.
        assert!(json["dispatch"].get("artifact_id").is_none());
    }

    #[test]
    fn test_outcome_meta_defaults() {
        let meta = OutcomeMeta::default();
        assert!(!meta.override_denied);
        assert!(!meta.repair_attempted);
        assert!(meta.artifact_id.is_none());
    }
}
