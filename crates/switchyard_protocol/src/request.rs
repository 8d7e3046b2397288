//! Inbound work request document and validation.
//!
//! Requests arrive as JSON from the CLI or from queued tasks. Validation is
//! collect-all: every problem in the document is reported in one pass so the
//! caller can fix the whole request at once instead of replaying it per field.

use crate::types::{Initiator, RiskFlags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Upper bound on `user_goal`, in characters.
pub const MAX_GOAL_CHARS: usize = 2000;

/// Operating-posture constraints. All three must be asserted true on every
/// request; a request that relaxes any of them is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Constraints {
    #[serde(default)]
    pub no_public_exposure: bool,
    #[serde(default)]
    pub structured_outputs_only: bool,
    #[serde(default)]
    pub on_demand_only: bool,
}

impl Constraints {
    pub fn all_asserted() -> Self {
        Constraints {
            no_public_exposure: true,
            structured_outputs_only: true,
            on_demand_only: true,
        }
    }
}

/// A validated work request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub request_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub initiator: Initiator,
    pub user_goal: String,
    pub constraints: Constraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "RiskFlags::is_empty")]
    pub risk_flags: RiskFlags,
}

impl WorkRequest {
    /// Render the optional context for embedding in a prompt. Objects are
    /// serialized compactly; strings pass through.
    pub fn context_text(&self) -> Option<String> {
        match &self.context {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// One validation problem, tied to the field that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn required_string(doc: &Value, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match doc.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, "required field is missing"));
            None
        }
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                errors.push(FieldError::new(field, "must not be empty"));
                None
            } else {
                Some(s.clone())
            }
        }
        Some(other) => {
            errors.push(FieldError::new(
                field,
                format!("expected a string, got {}", json_type_name(other)),
            ));
            None
        }
    }
}

fn asserted_constraint(
    map: &serde_json::Map<String, Value>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> bool {
    let field = format!("constraints.{}", name);
    match map.get(name) {
        Some(Value::Bool(true)) => true,
        Some(Value::Bool(false)) => {
            errors.push(FieldError::new(&field, "must be true"));
            false
        }
        Some(other) => {
            errors.push(FieldError::new(
                &field,
                format!("expected a boolean, got {}", json_type_name(other)),
            ));
            false
        }
        None => {
            errors.push(FieldError::new(&field, "required field is missing"));
            false
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate a raw JSON document into a [`WorkRequest`].
///
/// Returns every field error found, not just the first. A request is only
/// constructed when the error list is empty.
pub fn validate_request(doc: &Value) -> Result<WorkRequest, Vec<FieldError>> {
    let mut errors = Vec::new();

    if !doc.is_object() {
        errors.push(FieldError::new(
            "(document)",
            format!("expected a JSON object, got {}", json_type_name(doc)),
        ));
        return Err(errors);
    }

    let request_id = required_string(doc, "request_id", &mut errors);
    let session_id = required_string(doc, "session_id", &mut errors);

    let timestamp = match required_string(doc, "timestamp", &mut errors) {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => {
                errors.push(FieldError::new(
                    "timestamp",
                    "must be an RFC 3339 timestamp, e.g. 2026-01-15T09:30:00Z",
                ));
                None
            }
        },
        None => None,
    };

    let initiator = match required_string(doc, "initiator", &mut errors) {
        Some(raw) => match raw.parse::<Initiator>() {
            Ok(i) => Some(i),
            Err(_) => {
                errors.push(FieldError::new(
                    "initiator",
                    "must be 'user' or 'system'",
                ));
                None
            }
        },
        None => None,
    };

    let user_goal = match required_string(doc, "user_goal", &mut errors) {
        Some(goal) => {
            if goal.chars().count() > MAX_GOAL_CHARS {
                errors.push(FieldError::new(
                    "user_goal",
                    format!("must be at most {} characters", MAX_GOAL_CHARS),
                ));
                None
            } else {
                Some(goal)
            }
        }
        None => None,
    };

    let constraints = match doc.get("constraints") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("constraints", "required field is missing"));
            None
        }
        Some(Value::Object(map)) => {
            let no_public = asserted_constraint(map, "no_public_exposure", &mut errors);
            let structured = asserted_constraint(map, "structured_outputs_only", &mut errors);
            let on_demand = asserted_constraint(map, "on_demand_only", &mut errors);
            if no_public && structured && on_demand {
                Some(Constraints::all_asserted())
            } else {
                None
            }
        }
        Some(other) => {
            errors.push(FieldError::new(
                "constraints",
                format!("expected an object, got {}", json_type_name(other)),
            ));
            None
        }
    };

    let context = match doc.get("context") {
        None | Some(Value::Null) => None,
        Some(value @ Value::String(_)) | Some(value @ Value::Object(_)) => Some(value.clone()),
        Some(other) => {
            errors.push(FieldError::new(
                "context",
                format!("expected a string or object, got {}", json_type_name(other)),
            ));
            None
        }
    };

    let mut risk_flags = RiskFlags::new();
    match doc.get("risk_flags") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, value) in map {
                match value {
                    Value::Bool(b) => {
                        risk_flags.insert(name.clone(), *b);
                    }
                    other => {
                        errors.push(FieldError::new(
                            &format!("risk_flags.{}", name),
                            format!("expected a boolean, got {}", json_type_name(other)),
                        ));
                    }
                }
            }
        }
        Some(other) => {
            errors.push(FieldError::new(
                "risk_flags",
                format!("expected an object, got {}", json_type_name(other)),
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // All Somes by construction: a None would have pushed an error above.
    match (request_id, session_id, timestamp, initiator, user_goal, constraints) {
        (Some(request_id), Some(session_id), Some(timestamp), Some(initiator), Some(user_goal), Some(constraints)) => {
            Ok(WorkRequest {
                request_id,
                session_id,
                timestamp,
                initiator,
                user_goal,
                constraints,
                context,
                risk_flags,
            })
        }
        _ => Err(vec![FieldError::new(
            "(document)",
            "internal validation inconsistency",
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_doc() -> Value {
        json!({
            "request_id": "req-001",
            "session_id": "sess-001",
            "timestamp": "2026-01-15T09:30:00Z",
            "initiator": "user",
            "user_goal": "Draft a weekly plan for the data pipeline",
            "constraints": {
                "no_public_exposure": true,
                "structured_outputs_only": true,
                "on_demand_only": true
            }
        })
    }

    #[test]
    fn test_valid_request_parses() {
        let req = validate_request(&valid_doc()).unwrap();
        assert_eq!(req.request_id, "req-001");
        assert_eq!(req.initiator, Initiator::User);
        assert!(req.constraints.no_public_exposure);
        assert!(req.risk_flags.is_empty());
        assert!(req.context.is_none());
    }

    #[test]
    fn test_all_errors_collected_in_one_pass() {
        let doc = json!({
            "request_id": "",
            "timestamp": "yesterday",
            "initiator": "bot",
            "user_goal": 42,
            "constraints": { "no_public_exposure": false }
        });
        let errors = validate_request(&doc).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"request_id"));
        assert!(fields.contains(&"session_id"));
        assert!(fields.contains(&"timestamp"));
        assert!(fields.contains(&"initiator"));
        assert!(fields.contains(&"user_goal"));
        assert!(fields.contains(&"constraints.no_public_exposure"));
        assert!(fields.contains(&"constraints.structured_outputs_only"));
        assert!(fields.contains(&"constraints.on_demand_only"));
        assert!(errors.len() >= 8);
    }

    #[test]
    fn test_goal_length_limit_is_chars_not_bytes() {
        let mut doc = valid_doc();
        doc["user_goal"] = Value::String("ü".repeat(MAX_GOAL_CHARS));
        assert!(validate_request(&doc).is_ok());

        doc["user_goal"] = Value::String("ü".repeat(MAX_GOAL_CHARS + 1));
        let errors = validate_request(&doc).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "user_goal");
    }

    #[test]
    fn test_relaxed_constraint_rejected() {
        let mut doc = valid_doc();
        doc["constraints"]["on_demand_only"] = json!(false);
        let errors = validate_request(&doc).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "constraints.on_demand_only");
        assert_eq!(errors[0].message, "must be true");
    }

    #[test]
    fn test_risk_flags_must_be_booleans() {
        let mut doc = valid_doc();
        doc["risk_flags"] = json!({ "deployment": "yes", "external_comms": true });
        let errors = validate_request(&doc).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "risk_flags.deployment");
    }

    #[test]
    fn test_context_accepts_string_and_object() {
        let mut doc = valid_doc();
        doc["context"] = json!("prior discussion notes");
        let req = validate_request(&doc).unwrap();
        assert_eq!(req.context_text().unwrap(), "prior discussion notes");

        doc["context"] = json!({ "ticket": "OPS-42" });
        let req = validate_request(&doc).unwrap();
        assert!(req.context_text().unwrap().contains("OPS-42"));

        doc["context"] = json!([1, 2, 3]);
        let errors = validate_request(&doc).unwrap_err();
        assert_eq!(errors[0].field, "context");
    }

    #[test]
    fn test_non_object_document() {
        let errors = validate_request(&json!("a string")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "(document)");
    }

    #[test]
    fn test_request_serde_roundtrip() {
        let req = validate_request(&valid_doc()).unwrap();
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: WorkRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(req, decoded);
    }
}
