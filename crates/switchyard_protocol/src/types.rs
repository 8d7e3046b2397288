//! Canonical enums and risk-flag vocabulary.
//!
//! These are the CANONICAL definitions - every crate that talks about gate
//! decisions, dispatch states, tasks or risk flags uses these types rather
//! than its own strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Who initiated a work request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    #[default]
    User,
    System,
}

impl Initiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Initiator::User => "user",
            Initiator::System => "system",
        }
    }
}

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Initiator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Initiator::User),
            "system" => Ok(Initiator::System),
            _ => Err(format!("Invalid initiator: '{}'. Expected: user or system", s)),
        }
    }
}

/// Session lifecycle state. Sessions open on first reference and stay open
/// until explicitly closed; they are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(SessionStatus::Open),
            "closed" => Ok(SessionStatus::Closed),
            _ => Err(format!(
                "Invalid session status: '{}'. Expected: open or closed",
                s
            )),
        }
    }
}

/// Work intent assigned by the classifier.
///
/// Classification is keyword based and ordered; `ReviewNeeded` is the
/// fallback when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    PlanWork,
    DraftContent,
    SalesInternal,
    Research,
    OpsAutomation,
    ReviewNeeded,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PlanWork => "PLAN_WORK",
            Intent::DraftContent => "DRAFT_CONTENT",
            Intent::SalesInternal => "SALES_INTERNAL",
            Intent::Research => "RESEARCH",
            Intent::OpsAutomation => "OPS_AUTOMATION",
            Intent::ReviewNeeded => "REVIEW_NEEDED",
        }
    }

    /// Intents whose output is always a draft for a human, never an action.
    pub fn is_draft_only(&self) -> bool {
        matches!(self, Intent::DraftContent | Intent::SalesInternal)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAN_WORK" => Ok(Intent::PlanWork),
            "DRAFT_CONTENT" => Ok(Intent::DraftContent),
            "SALES_INTERNAL" => Ok(Intent::SalesInternal),
            "RESEARCH" => Ok(Intent::Research),
            "OPS_AUTOMATION" => Ok(Intent::OpsAutomation),
            "REVIEW_NEEDED" => Ok(Intent::ReviewNeeded),
            _ => Err(format!("Unknown intent: '{}'", s)),
        }
    }
}

/// Verdict of the governance gate, strongest first.
///
/// The gate evaluates its phases in a fixed order and the first phase that
/// fires wins: hard risk flags produce `Blocked`, deny phrases produce
/// `Deny`, accumulated soft flags produce `ApproveWithFlag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Deny,
    Blocked,
    ApproveWithFlag,
    Approve,
}

impl GateDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateDecision::Deny => "deny",
            GateDecision::Blocked => "blocked",
            GateDecision::ApproveWithFlag => "approve_with_flag",
            GateDecision::Approve => "approve",
        }
    }

    /// Whether this verdict lets the request proceed to generation.
    pub fn is_approval(&self) -> bool {
        matches!(self, GateDecision::Approve | GateDecision::ApproveWithFlag)
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GateDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deny" => Ok(GateDecision::Deny),
            "blocked" => Ok(GateDecision::Blocked),
            "approve_with_flag" => Ok(GateDecision::ApproveWithFlag),
            "approve" => Ok(GateDecision::Approve),
            _ => Err(format!(
                "Invalid gate decision: '{}'. Expected: deny, blocked, approve_with_flag, or approve",
                s
            )),
        }
    }
}

/// Terminal state of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchState {
    /// Hard risk flag tripped; nothing was generated.
    Blocked,
    /// Governance approval required and not yet granted.
    Gated,
    /// Artifact generated, validated and committed.
    Dispatched,
    /// Gate denied the request outright.
    Rejected,
    /// Infrastructure failure (agent crash, timeout, ledger error).
    Error,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Blocked => "BLOCKED",
            DispatchState::Gated => "GATED",
            DispatchState::Dispatched => "DISPATCHED",
            DispatchState::Rejected => "REJECTED",
            DispatchState::Error => "ERROR",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DispatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BLOCKED" => Ok(DispatchState::Blocked),
            "GATED" => Ok(DispatchState::Gated),
            "DISPATCHED" => Ok(DispatchState::Dispatched),
            "REJECTED" => Ok(DispatchState::Rejected),
            "ERROR" => Ok(DispatchState::Error),
            _ => Err(format!("Invalid dispatch state: '{}'", s)),
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            _ => Err(format!(
                "Invalid task status: '{}'. Expected: todo, doing, done, or blocked",
                s
            )),
        }
    }
}

/// Kind of a recorded governance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Defer,
    Approve,
    Reject,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Defer => "defer",
            DecisionKind::Approve => "approve",
            DecisionKind::Reject => "reject",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DecisionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "defer" => Ok(DecisionKind::Defer),
            "approve" => Ok(DecisionKind::Approve),
            "reject" => Ok(DecisionKind::Reject),
            _ => Err(format!(
                "Invalid decision kind: '{}'. Expected: defer, approve, or reject",
                s
            )),
        }
    }
}

/// Why a task hit its stop-loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Rejected,
    Blocked,
    Gated,
    RepairFailed,
    PolicyGate,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Rejected => "REJECTED",
            FailureKind::Blocked => "BLOCKED",
            FailureKind::Gated => "GATED",
            FailureKind::RepairFailed => "REPAIR_FAILED",
            FailureKind::PolicyGate => "POLICY_GATE",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REJECTED" => Ok(FailureKind::Rejected),
            "BLOCKED" => Ok(FailureKind::Blocked),
            "GATED" => Ok(FailureKind::Gated),
            "REPAIR_FAILED" => Ok(FailureKind::RepairFailed),
            "POLICY_GATE" => Ok(FailureKind::PolicyGate),
            _ => Err(format!("Invalid failure kind: '{}'", s)),
        }
    }
}

/// Action types written to the ledger. One per state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Route,
    Dispatch,
    TaskNext,
    TaskUpdate,
    TaskClose,
    StopLoss,
    PolicyGate,
    HumanReviewRetry,
    HumanReviewClose,
    HumanReviewReject,
    ApproveOverride,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Route => "route",
            ActionKind::Dispatch => "dispatch",
            ActionKind::TaskNext => "task_next",
            ActionKind::TaskUpdate => "task_update",
            ActionKind::TaskClose => "task_close",
            ActionKind::StopLoss => "stop_loss",
            ActionKind::PolicyGate => "policy_gate",
            ActionKind::HumanReviewRetry => "human_review_retry",
            ActionKind::HumanReviewClose => "human_review_close",
            ActionKind::HumanReviewReject => "human_review_reject",
            ActionKind::ApproveOverride => "approve_override",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "route" => Ok(ActionKind::Route),
            "dispatch" => Ok(ActionKind::Dispatch),
            "task_next" => Ok(ActionKind::TaskNext),
            "task_update" => Ok(ActionKind::TaskUpdate),
            "task_close" => Ok(ActionKind::TaskClose),
            "stop_loss" => Ok(ActionKind::StopLoss),
            "policy_gate" => Ok(ActionKind::PolicyGate),
            "human_review_retry" => Ok(ActionKind::HumanReviewRetry),
            "human_review_close" => Ok(ActionKind::HumanReviewClose),
            "human_review_reject" => Ok(ActionKind::HumanReviewReject),
            "approve_override" => Ok(ActionKind::ApproveOverride),
            _ => Err(format!("Invalid action kind: '{}'", s)),
        }
    }
}

// ============================================================================
// Risk flags
// ============================================================================

/// Caller-asserted risk flags. BTreeMap so reasons render in a stable order.
pub type RiskFlags = BTreeMap<String, bool>;

pub const RISK_ARCHITECTURE_CHANGE: &str = "architecture_change";
pub const RISK_DEPLOYMENT: &str = "deployment";
pub const RISK_EXTERNAL_COMMS: &str = "external_comms";

/// Flags that block dispatch unconditionally when set true. `external_comms`
/// is deliberately absent: on its own it only routes the request through
/// governance.
pub const HARD_BLOCK_RISK_FLAGS: &[&str] = &[RISK_ARCHITECTURE_CHANGE, RISK_DEPLOYMENT];

/// True when `name` is present and set to true.
pub fn flag_is_true(flags: &RiskFlags, name: &str) -> bool {
    flags.get(name).copied().unwrap_or(false)
}

/// True when no risk flag other than `external_comms` is truthy. An empty
/// map qualifies. The draft-only bypass requires this.
pub fn no_flags_beyond_external_comms(flags: &RiskFlags) -> bool {
    flags
        .iter()
        .all(|(name, value)| !*value || name == RISK_EXTERNAL_COMMS)
}
