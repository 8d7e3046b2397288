//! The governance gate.
//!
//! Four phases in strict priority order: hard risk flags, deny phrases,
//! flag accumulation, then the verdict. `blocked` and `deny` short-circuit
//! before any flags are collected.

use switchyard_protocol::{
    flag_is_true, GateDecision, Intent, RiskFlags, HARD_BLOCK_RISK_FLAGS, RISK_EXTERNAL_COMMS,
};
use tracing::debug;

/// Phrases that end a request outright. Ordered; scanned before soft flags.
pub const DENY_PHRASES: &[&str] = &[
    "send to client",
    "send email",
    "mass email",
    "post publicly",
    "wire transfer",
    "delete production",
    "sign contract",
];

/// Chars on each side of a deny-phrase match inside which the word
/// `internal` exempts the match.
pub const INTERNAL_EXEMPT_WINDOW: usize = 20;

/// Soft-flag phrases: a match adds the flag but never blocks on its own.
pub const SOFT_FLAG_PHRASES: &[(&str, &str)] = &[
    ("urgent", "urgency_pressure"),
    ("asap", "urgency_pressure"),
    ("bypass", "process_bypass"),
    ("skip review", "process_bypass"),
    ("confidential", "sensitive_content"),
    ("secret", "sensitive_content"),
    ("legal", "legal_review"),
    ("contract", "legal_review"),
    ("payment", "financial_review"),
    ("invoice", "financial_review"),
];

/// Flag recorded when classification fell through to the review default.
pub const FLAG_UNCLASSIFIED: &str = "unclassified";

/// Gate verdict plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub decision: GateDecision,
    /// Soft flags in evaluation order, deduplicated.
    pub flags: Vec<String>,
    /// Set whenever the decision is not a plain approve.
    pub reason: Option<String>,
}

/// Slice of `s` spanning up to `span` chars on each side of `[start, end)`.
fn window_around(s: &str, start: usize, end: usize, span: usize) -> &str {
    let mut begin = start;
    for _ in 0..span {
        match s[..begin].char_indices().next_back() {
            Some((i, _)) => begin = i,
            None => break,
        }
    }
    let mut stop = end;
    for _ in 0..span {
        match s[stop..].chars().next() {
            Some(c) => stop += c.len_utf8(),
            None => break,
        }
    }
    &s[begin..stop]
}

/// First deny phrase with an occurrence not exempted by a nearby `internal`.
fn find_deny_phrase(haystack: &str) -> Option<&'static str> {
    for phrase in DENY_PHRASES {
        for (start, matched) in haystack.match_indices(phrase) {
            let window = window_around(
                haystack,
                start,
                start + matched.len(),
                INTERNAL_EXEMPT_WINDOW,
            );
            if !window.contains("internal") {
                return Some(phrase);
            }
        }
    }
    None
}

/// Evaluate the governance gate for a classified request.
///
/// `defaulted` marks a goal that fell through to the review intent; it
/// contributes a flag in phase three.
pub fn evaluate_gate(intent: Intent, defaulted: bool, goal: &str, risk_flags: &RiskFlags) -> GateOutcome {
    let haystack = goal.to_lowercase();

    // Phase 1: hard risk flags. Never overridable.
    let tripped: Vec<&str> = HARD_BLOCK_RISK_FLAGS
        .iter()
        .copied()
        .filter(|name| flag_is_true(risk_flags, name))
        .collect();
    if !tripped.is_empty() {
        let reason = format!("hard risk flag: {}", tripped.join(", "));
        debug!(intent = %intent, %reason, "Gate blocked");
        return GateOutcome {
            decision: GateDecision::Blocked,
            flags: Vec::new(),
            reason: Some(reason),
        };
    }

    // Phase 2: deny phrases, exempted only by a nearby `internal`.
    if let Some(phrase) = find_deny_phrase(&haystack) {
        let reason = format!("deny phrase: '{}'", phrase);
        debug!(intent = %intent, %reason, "Gate denied");
        return GateOutcome {
            decision: GateDecision::Deny,
            flags: Vec::new(),
            reason: Some(reason),
        };
    }

    // Phase 3: flag accumulation.
    fn add_flag(flags: &mut Vec<String>, flag: &str) {
        if !flags.iter().any(|f| f == flag) {
            flags.push(flag.to_string());
        }
    }

    let mut flags: Vec<String> = Vec::new();
    if defaulted {
        add_flag(&mut flags, FLAG_UNCLASSIFIED);
    }
    if flag_is_true(risk_flags, RISK_EXTERNAL_COMMS) {
        add_flag(&mut flags, RISK_EXTERNAL_COMMS);
    }
    for (phrase, flag) in SOFT_FLAG_PHRASES {
        if haystack.contains(phrase) {
            add_flag(&mut flags, flag);
        }
    }

    // Phase 4: verdict.
    if flags.is_empty() {
        GateOutcome {
            decision: GateDecision::Approve,
            flags,
            reason: None,
        }
    } else {
        let reason = format!("flagged: {}", flags.join(", "));
        debug!(intent = %intent, %reason, "Gate approved with flags");
        GateOutcome {
            decision: GateDecision::ApproveWithFlag,
            flags,
            reason: Some(reason),
        }
    }
}
