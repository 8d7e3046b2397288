//! Intent classification, the routing table, and the governance gate.
//!
//! [`route_request`] is the one entry point: it classifies the goal, looks
//! up the routing entry, runs the gate, and folds the three into a
//! [`RouteDecision`]. The decision carries everything the dispatcher needs;
//! nothing here touches the ledger.

mod classify;
mod gate;
mod routes;

pub use classify::{classify, Classification, ClassifyRule, CLASSIFY_RULES, FALLBACK_AGENT};
pub use gate::{
    evaluate_gate, GateOutcome, DENY_PHRASES, FLAG_UNCLASSIFIED, INTERNAL_EXEMPT_WINDOW,
    SOFT_FLAG_PHRASES,
};
pub use routes::{route_for, RouteEntry, ROUTING_TABLE};

use switchyard_protocol::{GateDecision, RouteDecision, WorkRequest};
use tracing::info;

/// Classify, route and gate a validated request.
///
/// Governance is required when the routing table says so for the intent, or
/// whenever the gate came back with anything other than a plain approve or
/// deny. A denied request never reaches an approver, so deny alone does not
/// raise the governance bit.
pub fn route_request(req: &WorkRequest) -> RouteDecision {
    let classification = classify(&req.user_goal);
    let entry = route_for(classification.intent);
    let gate = evaluate_gate(
        classification.intent,
        classification.defaulted,
        &req.user_goal,
        &req.risk_flags,
    );

    let governance_required = entry.governance_required
        || matches!(
            gate.decision,
            GateDecision::Blocked | GateDecision::ApproveWithFlag
        );

    let decision = RouteDecision {
        intent: classification.intent,
        defaulted: classification.defaulted,
        primary_agent: entry.primary_agent.to_string(),
        secondary_agents: entry
            .secondary_agents
            .iter()
            .map(|a| a.to_string())
            .collect(),
        governance_required,
        gate_decision: gate.decision,
        gate_flags: gate.flags,
        gate_reason: gate.reason,
    };
    info!(
        request_id = %req.request_id,
        intent = %decision.intent,
        agent = %decision.primary_agent,
        gate = %decision.gate_decision,
        governance = decision.governance_required,
        "Routed request"
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use switchyard_protocol::{
        Constraints, Initiator, Intent, RiskFlags, RISK_ARCHITECTURE_CHANGE, RISK_EXTERNAL_COMMS,
    };

    fn request(goal: &str, risk_flags: RiskFlags) -> WorkRequest {
        WorkRequest {
            request_id: "req_0001".to_string(),
            session_id: "sess_0001".to_string(),
            timestamp: Utc::now(),
            initiator: Initiator::User,
            user_goal: goal.to_string(),
            constraints: Constraints::all_asserted(),
            context: None,
            risk_flags,
        }
    }

    #[test]
    fn test_clean_plan_request_routes_without_governance() {
        let decision = route_request(&request("plan the q3 roadmap", RiskFlags::new()));
        assert_eq!(decision.intent, Intent::PlanWork);
        assert_eq!(decision.primary_agent, "planner");
        assert_eq!(decision.secondary_agents, vec!["researcher".to_string()]);
        assert_eq!(decision.gate_decision, GateDecision::Approve);
        assert!(!decision.governance_required);
        assert!(!decision.defaulted);
    }

    #[test]
    fn test_table_governance_survives_plain_approve() {
        let decision = route_request(&request("draft a welcome note", RiskFlags::new()));
        assert_eq!(decision.intent, Intent::DraftContent);
        assert_eq!(decision.gate_decision, GateDecision::Approve);
        assert!(decision.governance_required);
    }

    #[test]
    fn test_gate_flags_raise_governance_on_ungated_intent() {
        let decision = route_request(&request("urgent: plan the migration", RiskFlags::new()));
        assert_eq!(decision.intent, Intent::PlanWork);
        assert_eq!(decision.gate_decision, GateDecision::ApproveWithFlag);
        assert_eq!(decision.gate_flags, vec!["urgency_pressure".to_string()]);
        assert!(decision.governance_required);
    }

    #[test]
    fn test_hard_flag_blocks_any_intent() {
        let mut flags = RiskFlags::new();
        flags.insert(RISK_ARCHITECTURE_CHANGE.to_string(), true);
        let decision = route_request(&request("research the platform split", flags));
        assert_eq!(decision.intent, Intent::Research);
        assert_eq!(decision.gate_decision, GateDecision::Blocked);
        assert!(decision.governance_required);
        assert!(decision.gate_reason.is_some());
    }

    #[test]
    fn test_deny_does_not_raise_governance_by_itself() {
        let decision = route_request(&request(
            "summarize this then wire transfer the balance",
            RiskFlags::new(),
        ));
        assert_eq!(decision.intent, Intent::Research);
        assert_eq!(decision.gate_decision, GateDecision::Deny);
        assert!(!decision.governance_required);
    }

    #[test]
    fn test_unmatched_goal_defaults_to_review() {
        let decision = route_request(&request("qwfp zxcv", RiskFlags::new()));
        assert_eq!(decision.intent, Intent::ReviewNeeded);
        assert_eq!(decision.primary_agent, FALLBACK_AGENT);
        assert!(decision.defaulted);
        assert_eq!(decision.gate_flags, vec![FLAG_UNCLASSIFIED.to_string()]);
        assert!(decision.governance_required);
    }

    #[test]
    fn test_external_comms_flag_carries_into_decision() {
        let mut flags = RiskFlags::new();
        flags.insert(RISK_EXTERNAL_COMMS.to_string(), true);
        let decision = route_request(&request("draft the partner update", flags));
        assert_eq!(decision.gate_decision, GateDecision::ApproveWithFlag);
        assert_eq!(decision.gate_flags, vec![RISK_EXTERNAL_COMMS.to_string()]);
    }
}
