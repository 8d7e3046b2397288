//! Keyword-based intent classification.
//!
//! The rule table is scanned in order and the first rule with a matching
//! keyword wins. Scan order is over the rule list, then over that rule's
//! keyword list - NOT over match positions in the goal, so an earlier rule
//! beats a keyword that appears earlier in the text.

use switchyard_protocol::Intent;
use tracing::debug;

/// One classification rule: intent, agent hint, keywords.
pub struct ClassifyRule {
    pub intent: Intent,
    pub agent_hint: &'static str,
    pub keywords: &'static [&'static str],
}

/// Ordered rule table. First match wins; order is policy, not convenience.
pub const CLASSIFY_RULES: &[ClassifyRule] = &[
    ClassifyRule {
        intent: Intent::PlanWork,
        agent_hint: "planner",
        keywords: &["plan", "roadmap", "milestone", "prioritize", "backlog"],
    },
    ClassifyRule {
        intent: Intent::DraftContent,
        agent_hint: "drafter",
        keywords: &["draft", "write", "blog", "post", "article", "newsletter"],
    },
    ClassifyRule {
        intent: Intent::SalesInternal,
        agent_hint: "sales_desk",
        keywords: &["outreach", "prospect", "lead", "pitch", "follow-up"],
    },
    ClassifyRule {
        intent: Intent::Research,
        agent_hint: "researcher",
        keywords: &["research", "investigate", "compare", "summarize", "analyze"],
    },
    ClassifyRule {
        intent: Intent::OpsAutomation,
        agent_hint: "ops_runner",
        keywords: &["automate", "schedule", "pipeline", "deploy", "script"],
    },
];

/// Agent hint used when no rule matches.
pub const FALLBACK_AGENT: &str = "triage";

/// Result of classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub agent_hint: &'static str,
    /// True when the fallback intent was assigned because nothing matched.
    pub defaulted: bool,
}

/// Classify a goal. Pure; cannot fail.
pub fn classify(goal: &str) -> Classification {
    let haystack = goal.to_lowercase();

    for rule in CLASSIFY_RULES {
        for keyword in rule.keywords {
            if haystack.contains(keyword) {
                debug!(intent = %rule.intent, keyword, "Goal classified");
                return Classification {
                    intent: rule.intent,
                    agent_hint: rule.agent_hint,
                    defaulted: false,
                };
            }
        }
    }

    debug!("No rule matched; assigning review fallback");
    Classification {
        intent: Intent::ReviewNeeded,
        agent_hint: FALLBACK_AGENT,
        defaulted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_classification() {
        let c = classify("Draft a blog post about onboarding");
        assert_eq!(c.intent, Intent::DraftContent);
        assert_eq!(c.agent_hint, "drafter");
        assert!(!c.defaulted);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let c = classify("PLAN the next sprint");
        assert_eq!(c.intent, Intent::PlanWork);
    }

    #[test]
    fn test_rule_order_beats_match_position() {
        // "research" appears first in the text, but the plan rule is scanned
        // first and its keyword is present.
        let c = classify("research how to build the plan");
        assert_eq!(c.intent, Intent::PlanWork);
    }

    #[test]
    fn test_no_match_defaults_to_review() {
        let c = classify("qwertyuiop");
        assert_eq!(c.intent, Intent::ReviewNeeded);
        assert_eq!(c.agent_hint, FALLBACK_AGENT);
        assert!(c.defaulted);
    }

    #[test]
    fn test_every_rule_keyword_reaches_its_intent() {
        // Guards against a keyword being shadowed by an earlier rule.
        for (i, rule) in CLASSIFY_RULES.iter().enumerate() {
            for keyword in rule.keywords {
                let c = classify(keyword);
                let winner = CLASSIFY_RULES[..=i]
                    .iter()
                    .find(|r| r.keywords.iter().any(|k| keyword.contains(k)))
                    .map(|r| r.intent)
                    .unwrap_or(rule.intent);
                assert_eq!(c.intent, winner, "keyword '{}' misrouted", keyword);
            }
        }
    }
}
