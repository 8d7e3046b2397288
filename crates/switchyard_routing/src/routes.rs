//! Per-intent routing table.
//!
//! An explicit data structure so tests (and operators reading the source)
//! can enumerate exactly which intents demand governance review.

use switchyard_protocol::Intent;

/// Routing entry for one intent.
pub struct RouteEntry {
    pub intent: Intent,
    pub primary_agent: &'static str,
    pub secondary_agents: &'static [&'static str],
    /// Whether this intent always needs governance review, independent of
    /// what the gate finds in the goal.
    pub governance_required: bool,
}

/// The routing table. Content intents and automation are reviewed by
/// default; planning and research run free.
pub const ROUTING_TABLE: &[RouteEntry] = &[
    RouteEntry {
        intent: Intent::PlanWork,
        primary_agent: "planner",
        secondary_agents: &["researcher"],
        governance_required: false,
    },
    RouteEntry {
        intent: Intent::DraftContent,
        primary_agent: "drafter",
        secondary_agents: &[],
        governance_required: true,
    },
    RouteEntry {
        intent: Intent::SalesInternal,
        primary_agent: "sales_desk",
        secondary_agents: &["drafter"],
        governance_required: true,
    },
    RouteEntry {
        intent: Intent::Research,
        primary_agent: "researcher",
        secondary_agents: &[],
        governance_required: false,
    },
    RouteEntry {
        intent: Intent::OpsAutomation,
        primary_agent: "ops_runner",
        secondary_agents: &[],
        governance_required: true,
    },
    RouteEntry {
        intent: Intent::ReviewNeeded,
        primary_agent: "triage",
        secondary_agents: &[],
        governance_required: true,
    },
];

/// Look up the routing entry for an intent. Every intent has one.
pub fn route_for(intent: Intent) -> &'static RouteEntry {
    ROUTING_TABLE
        .iter()
        .find(|e| e.intent == intent)
        .unwrap_or(&ROUTING_TABLE[ROUTING_TABLE.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_intent_has_an_entry() {
        for intent in [
            Intent::PlanWork,
            Intent::DraftContent,
            Intent::SalesInternal,
            Intent::Research,
            Intent::OpsAutomation,
            Intent::ReviewNeeded,
        ] {
            assert_eq!(route_for(intent).intent, intent);
        }
    }

    #[test]
    fn test_draft_only_intents_are_governed() {
        // Content that could leave the building is reviewed by default;
        // the draft-only bypass exists to relieve exactly this.
        assert!(route_for(Intent::DraftContent).governance_required);
        assert!(route_for(Intent::SalesInternal).governance_required);
    }

    #[test]
    fn test_plan_and_research_run_free() {
        assert!(!route_for(Intent::PlanWork).governance_required);
        assert!(!route_for(Intent::Research).governance_required);
    }

    #[test]
    fn test_fallback_intent_is_governed() {
        assert!(route_for(Intent::ReviewNeeded).governance_required);
    }
}
