//! Contract validation for generated documents.
//!
//! [`validate_document`] collects every violation in one pass and never
//! errors or panics; an empty list means the document satisfies the
//! contract. Violations carry a stable code, a JSON-ish path, and a
//! human-readable message.

use crate::store::AgentContract;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Upper bound on `summary`, in characters.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Upper bound on a structured `outputs[i].content`, measured over its
/// serialized JSON form. String content is not capped.
pub const STRUCTURED_CONTENT_MAX_CHARS: usize = 4000;

/// Accepted `classification` levels, matched case-insensitively.
pub const CLASSIFICATION_LEVELS: &[&str] = &["public", "internal", "confidential", "restricted"];

/// Tables a `ledger_writes` item may target.
pub const KNOWN_LEDGER_TABLES: &[&str] = &[
    "sy_sessions",
    "sy_actions",
    "sy_decisions",
    "sy_artifacts",
    "sy_tasks",
];

pub const CODE_MISSING_FIELD: &str = "missing_field";
pub const CODE_FORBIDDEN_TOKEN: &str = "forbidden_token";
pub const CODE_BAD_TYPE: &str = "bad_type";
pub const CODE_OUT_OF_RANGE: &str = "out_of_range";
pub const CODE_UNKNOWN_VALUE: &str = "unknown_value";
pub const CODE_UNKNOWN_TABLE: &str = "unknown_table";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractViolation {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl ContractViolation {
    fn new(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

/// Concatenate every object key and string value in the document,
/// newline-separated so a token cannot straddle two values.
pub fn flatten_text(value: &Value) -> String {
    fn walk(value: &Value, out: &mut String) {
        match value {
            Value::String(s) => {
                out.push_str(s);
                out.push('\n');
            }
            Value::Array(items) => {
                for item in items {
                    walk(item, out);
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    out.push_str(key);
                    out.push('\n');
                    walk(item, out);
                }
            }
            _ => {}
        }
    }

    let mut out = String::new();
    walk(value, &mut out);
    out
}

/// Check a generated document against its agent contract.
///
/// All violations are collected; nothing short-circuits except a document
/// that is not a JSON object at all.
pub fn validate_document(contract: &AgentContract, doc: &Value) -> Vec<ContractViolation> {
    let mut violations = Vec::new();

    let map = match doc.as_object() {
        Some(map) => map,
        None => {
            violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                "$",
                "document must be a JSON object",
            ));
            return violations;
        }
    };

    for field in &contract.required_fields {
        if !map.contains_key(field.as_str()) {
            violations.push(ContractViolation::new(
                CODE_MISSING_FIELD,
                field.as_str(),
                format!("required field '{}' is missing", field),
            ));
        }
    }

    let flat = flatten_text(doc).to_lowercase();
    for token in &contract.forbidden_outputs {
        if flat.contains(&token.to_lowercase()) {
            violations.push(ContractViolation::new(
                CODE_FORBIDDEN_TOKEN,
                "$",
                format!("forbidden token '{}' appears in the document", token),
            ));
        }
    }

    if let Some(value) = map.get("summary") {
        check_summary(value, &mut violations);
    }
    if let Some(value) = map.get("classification") {
        check_classification(value, &mut violations);
    }
    if let Some(value) = map.get("outputs") {
        check_outputs(value, &mut violations);
    }
    if let Some(value) = map.get("next_actions") {
        check_item_fields(value, "next_actions", &["owner_agent", "title"], &mut violations);
    }
    if let Some(value) = map.get("ledger_writes") {
        check_ledger_writes(value, &mut violations);
    }

    violations
}

fn check_summary(value: &Value, violations: &mut Vec<ContractViolation>) {
    let text = match value.as_str() {
        Some(text) => text,
        None => {
            violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                "summary",
                "summary must be a string",
            ));
            return;
        }
    };
    let chars = text.chars().count();
    if chars == 0 || chars > SUMMARY_MAX_CHARS {
        violations.push(ContractViolation::new(
            CODE_OUT_OF_RANGE,
            "summary",
            format!("summary must be 1-{} characters, got {}", SUMMARY_MAX_CHARS, chars),
        ));
    }
}

fn check_classification(value: &Value, violations: &mut Vec<ContractViolation>) {
    let text = match value.as_str() {
        Some(text) => text,
        None => {
            violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                "classification",
                "classification must be a string",
            ));
            return;
        }
    };
    if !CLASSIFICATION_LEVELS
        .iter()
        .any(|level| level.eq_ignore_ascii_case(text))
    {
        violations.push(ContractViolation::new(
            CODE_UNKNOWN_VALUE,
            "classification",
            format!(
                "'{}' is not a classification level (expected one of: {})",
                text,
                CLASSIFICATION_LEVELS.join(", ")
            ),
        ));
    }
}

fn check_outputs(value: &Value, violations: &mut Vec<ContractViolation>) {
    let items = match value.as_array() {
        Some(items) => items,
        None => {
            violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                "outputs",
                "outputs must be an array",
            ));
            return;
        }
    };
    if items.is_empty() {
        violations.push(ContractViolation::new(
            CODE_OUT_OF_RANGE,
            "outputs",
            "outputs must contain at least one item",
        ));
        return;
    }

    for (i, item) in items.iter().enumerate() {
        let path = format!("outputs[{}]", i);
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => {
                violations.push(ContractViolation::new(
                    CODE_BAD_TYPE,
                    path,
                    "output item must be an object",
                ));
                continue;
            }
        };

        for sub in ["type", "title", "content"] {
            if !obj.contains_key(sub) {
                violations.push(ContractViolation::new(
                    CODE_MISSING_FIELD,
                    format!("{}.{}", path, sub),
                    format!("output item requires '{}'", sub),
                ));
            }
        }
        for sub in ["type", "title"] {
            if let Some(v) = obj.get(sub) {
                if !v.is_string() {
                    violations.push(ContractViolation::new(
                        CODE_BAD_TYPE,
                        format!("{}.{}", path, sub),
                        format!("'{}' must be a string", sub),
                    ));
                }
            }
        }
        if let Some(content) = obj.get("content") {
            if !content.is_string() {
                if let Ok(serialized) = serde_json::to_string(content) {
                    let chars = serialized.chars().count();
                    if chars > STRUCTURED_CONTENT_MAX_CHARS {
                        violations.push(ContractViolation::new(
                            CODE_OUT_OF_RANGE,
                            format!("{}.content", path),
                            format!(
                                "structured content serializes to {} characters, cap is {}",
                                chars, STRUCTURED_CONTENT_MAX_CHARS
                            ),
                        ));
                    }
                }
            }
        }
    }
}

/// Array-of-objects check: every item must carry each field as a string.
fn check_item_fields(
    value: &Value,
    name: &str,
    fields: &[&str],
    violations: &mut Vec<ContractViolation>,
) {
    let items = match value.as_array() {
        Some(items) => items,
        None => {
            violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                name,
                format!("{} must be an array", name),
            ));
            return;
        }
    };

    for (i, item) in items.iter().enumerate() {
        let path = format!("{}[{}]", name, i);
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => {
                violations.push(ContractViolation::new(
                    CODE_BAD_TYPE,
                    path,
                    "item must be an object",
                ));
                continue;
            }
        };
        for field in fields {
            match obj.get(*field) {
                None => violations.push(ContractViolation::new(
                    CODE_MISSING_FIELD,
                    format!("{}.{}", path, field),
                    format!("item requires '{}'", field),
                )),
                Some(v) if !v.is_string() => violations.push(ContractViolation::new(
                    CODE_BAD_TYPE,
                    format!("{}.{}", path, field),
                    format!("'{}' must be a string", field),
                )),
                Some(_) => {}
            }
        }
    }
}

fn check_ledger_writes(value: &Value, violations: &mut Vec<ContractViolation>) {
    let items = match value.as_array() {
        Some(items) => items,
        None => {
            violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                "ledger_writes",
                "ledger_writes must be an array",
            ));
            return;
        }
    };

    for (i, item) in items.iter().enumerate() {
        let path = format!("ledger_writes[{}]", i);
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => {
                violations.push(ContractViolation::new(
                    CODE_BAD_TYPE,
                    path,
                    "item must be an object",
                ));
                continue;
            }
        };

        if !obj.contains_key("data") {
            violations.push(ContractViolation::new(
                CODE_MISSING_FIELD,
                format!("{}.data", path),
                "ledger write requires 'data'",
            ));
        }
        match obj.get("table") {
            None => violations.push(ContractViolation::new(
                CODE_MISSING_FIELD,
                format!("{}.table", path),
                "ledger write requires 'table'",
            )),
            Some(Value::String(table)) => {
                if !KNOWN_LEDGER_TABLES.contains(&table.as_str()) {
                    violations.push(ContractViolation::new(
                        CODE_UNKNOWN_TABLE,
                        format!("{}.table", path),
                        format!("'{}' is not a ledger table", table),
                    ));
                }
            }
            Some(_) => violations.push(ContractViolation::new(
                CODE_BAD_TYPE,
                format!("{}.table", path),
                "'table' must be a string",
            )),
        }
    }
}
