//! Ledger entity types.
//!
//! These are the single source of truth for rows in the five ledger tables.
//! Enum-valued columns are stored as their canonical strings and parsed back
//! through the protocol types on read.

use crate::error::{LedgerError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_protocol::{
    new_id, ActionKind, DecisionKind, DispatchState, FailureKind, Initiator, Intent, SessionStatus,
    TaskStatus,
};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Decision subject under which override approvals are recorded.
pub fn override_subject(intent: Intent) -> String {
    format!("dispatch_override:{}", intent)
}

// ============================================================================
// Sessions
// ============================================================================

/// A conversation/work session. Never deleted; closing only flips `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub initiator: Initiator,
    pub status: SessionStatus,
    pub created_at: String,
    pub last_active_at: String,
    pub request_count: i64,
}

// ============================================================================
// Actions
// ============================================================================

/// One audited state-changing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub session_id: String,
    pub request_id: Option<String>,
    pub kind: ActionKind,
    pub intent: Option<Intent>,
    pub state: Option<DispatchState>,
    /// Free-form JSON payload (reasons, flags, task ids).
    pub payload: Option<Value>,
    pub created_at: String,
}

impl ActionRecord {
    pub fn new(session_id: &str, kind: ActionKind) -> Self {
        Self {
            id: new_id("act"),
            session_id: session_id.to_string(),
            request_id: None,
            kind,
            intent: None,
            state: None,
            payload: None,
            created_at: now_rfc3339(),
        }
    }

    pub fn with_request(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_state(mut self, state: DispatchState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// A recorded governance verdict (defer, approve, reject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub session_id: String,
    /// Action this decision was recorded alongside, when there is one.
    pub action_id: Option<String>,
    pub kind: DecisionKind,
    /// What was decided about, e.g. `dispatch_override:DRAFT_CONTENT`
    /// or `task_review:task_ab12...`.
    pub subject: String,
    pub reason: Option<String>,
    pub decided_by: String,
    pub created_at: String,
}

impl DecisionRecord {
    pub fn new(session_id: &str, kind: DecisionKind, subject: &str, decided_by: &str) -> Self {
        Self {
            id: new_id("dec"),
            session_id: session_id.to_string(),
            action_id: None,
            kind,
            subject: subject.to_string(),
            reason: None,
            decided_by: decided_by.to_string(),
            created_at: now_rfc3339(),
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_action(mut self, action_id: &str) -> Self {
        self.action_id = Some(action_id.to_string());
        self
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// A validated generated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub session_id: String,
    pub action_id: Option<String>,
    /// Agent that produced the document.
    pub agent: String,
    /// Output type from the contract, e.g. `plan`, `draft`.
    pub kind: String,
    pub title: Option<String>,
    /// The document body as JSON.
    pub content: Value,
    /// Sensitivity level from the generated document, when it carried one.
    pub classification: Option<String>,
    /// True when the committed document came from the repair attempt.
    pub repaired: bool,
    pub created_at: String,
}

impl ArtifactRecord {
    pub fn new(session_id: &str, agent: &str, kind: &str, content: Value) -> Self {
        Self {
            id: new_id("art"),
            session_id: session_id.to_string(),
            action_id: None,
            agent: agent.to_string(),
            kind: kind.to_string(),
            title: None,
            content,
            classification: None,
            repaired: false,
            created_at: now_rfc3339(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_classification(mut self, level: &str) -> Self {
        self.classification = Some(level.to_string());
        self
    }

    pub fn with_action(mut self, action_id: &str) -> Self {
        self.action_id = Some(action_id.to_string());
        self
    }

    pub fn with_repaired(mut self, repaired: bool) -> Self {
        self.repaired = repaired;
        self
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Typed view over the task `meta` JSON column.
///
/// Hold markers (`stop_loss_triggered`, `policy_gate_triggered`) are never
/// cleared once set; remediation adds fields next to them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    /// Seeded/demo task, excluded from ordinary queue pops.
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthetic: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_artifact_id: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub stop_loss_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_failure: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_at: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub policy_gate_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_gate_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_gate_at: Option<String>,

    /// Set alongside any hold: a human must look before the task moves again.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hil_required: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub stop_loss_retry_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_approved_at: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub review_rejected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_rejected_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_artifact_id: Option<String>,
}

impl TaskMeta {
    /// Parse the stored meta column; NULL or empty means all defaults.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(Self::default()),
            Some(s) if s.trim().is_empty() => Ok(Self::default()),
            Some(s) => serde_json::from_str(s).map_err(LedgerError::from),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(LedgerError::from)
    }
}

/// A unit of work in the todo/doing/done/blocked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub session_id: String,
    pub title: String,
    pub detail: Option<String>,
    pub status: TaskStatus,
    pub meta: TaskMeta,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    pub fn new(session_id: &str, title: &str) -> Self {
        let now = now_rfc3339();
        Self {
            id: new_id("task"),
            session_id: session_id.to_string(),
            title: title.to_string(),
            detail: None,
            status: TaskStatus::Todo,
            meta: TaskMeta::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_meta(mut self, meta: TaskMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Whether the task sits in a hold that human review can act on.
    pub fn is_reviewable(&self) -> bool {
        self.status == TaskStatus::Blocked && self.meta.stop_loss_triggered
    }
}
