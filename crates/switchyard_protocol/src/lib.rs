//! Canonical types for the Switchyard dispatch plane.
//!
//! Everything that crosses a crate boundary lives here: the inbound request
//! document and its validation, the gate/dispatch enums, and the outcome
//! documents handed back to callers. Crates must use these definitions
//! rather than re-declaring their own.

pub mod ids;
pub mod outcome;
pub mod request;
pub mod types;

pub use ids::new_id;
pub use outcome::{
    DispatchOutcome, DispatchReport, DispatchSummary, OutcomeMeta, RouteDecision, RouteSummary,
};
pub use request::{validate_request, Constraints, FieldError, WorkRequest, MAX_GOAL_CHARS};
pub use types::{
    flag_is_true, no_flags_beyond_external_comms, ActionKind, DecisionKind, DispatchState,
    FailureKind, GateDecision, Initiator, Intent, RiskFlags, SessionStatus, TaskStatus,
    HARD_BLOCK_RISK_FLAGS, RISK_ARCHITECTURE_CHANGE, RISK_DEPLOYMENT, RISK_EXTERNAL_COMMS,
};
