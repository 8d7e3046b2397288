//! Tolerant parsing of raw agent output.

use serde_json::Value;
use switchyard_contract::{validate_document, AgentContract};

/// Strip a Markdown code fence when the response is wrapped in one, info
/// string (` ```json `) included. Anything that does not look like a fence
/// passes through untouched.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[newline + 1..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => trimmed,
    }
}

/// Parse and validate one generation attempt. Failure returns every problem
/// found, stringified for the repair prompt and the audit payload.
pub(crate) fn parse_and_validate(contract: &AgentContract, raw: &str) -> Result<Value, Vec<String>> {
    let body = strip_code_fence(raw);
    let doc: Value = match serde_json::from_str(body) {
        Ok(doc) => doc,
        Err(e) => return Err(vec![format!("parse error: {}", e)]),
    };

    let violations = validate_document(contract, &doc);
    if violations.is_empty() {
        Ok(doc)
    } else {
        Err(violations.iter().map(|v| v.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_contract::ContractStore;

    #[test]
    fn test_plain_json_passes_through() {
        assert_eq!(strip_code_fence(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(strip_code_fence("  {\"a\": 1}\n"), r#"{"a": 1}"#);
    }

    #[test]
    fn test_fenced_block_is_unwrapped() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(raw), r#"{"a": 1}"#);

        let raw = "```\n{\"a\": 1}\n```\n";
        assert_eq!(strip_code_fence(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn test_trailing_prose_after_fence_is_dropped() {
        let raw = "```json\n{\"a\": 1}\n```\nHope this helps!";
        assert_eq!(strip_code_fence(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn test_unclosed_fence_passes_through() {
        let raw = "```json\n{\"a\": 1}";
        assert_eq!(strip_code_fence(raw), raw);
    }

    #[test]
    fn test_parse_error_is_reported_as_single_entry() {
        let store = ContractStore::builtin();
        let contract = store.get("planner").unwrap();
        let errors = parse_and_validate(contract, "this is not json").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("parse error:"));
    }

    #[test]
    fn test_violations_are_stringified() {
        let store = ContractStore::builtin();
        let contract = store.get("planner").unwrap();
        let errors = parse_and_validate(contract, "{}").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.starts_with("[missing_field]")));
    }

    #[test]
    fn test_valid_fenced_document() {
        let store = ContractStore::builtin();
        let contract = store.get("planner").unwrap();
        let raw = "```json\n{\"summary\": \"ok\", \"classification\": \"internal\", \"outputs\": [{\"type\": \"plan\", \"title\": \"t\", \"content\": \"c\"}]}\n```";
        let doc = parse_and_validate(contract, raw).unwrap();
        assert_eq!(doc["summary"], "ok");
    }
}
