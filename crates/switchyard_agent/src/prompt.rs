//! Prompt assembly for generation calls.
//!
//! The system prompt carries the contract so the agent knows what shape to
//! produce; the repair prompt replays the failed attempt with the validator
//! errors appended.

use serde_json::json;
use switchyard_contract::AgentContract;
use switchyard_protocol::{Intent, WorkRequest};

/// Compact example of the document shape every agent must emit.
fn shape_example() -> String {
    json!({
        "summary": "One-paragraph summary of what was produced.",
        "classification": "internal",
        "outputs": [
            {"type": "note", "title": "Result title", "content": "The result body."}
        ],
        "next_actions": [
            {"owner_agent": "triage", "title": "Optional follow-up task"}
        ]
    })
    .to_string()
}

/// System prompt for a dispatch to `contract.agent`.
pub fn build_system_prompt(contract: &AgentContract) -> String {
    let mut prompt = format!(
        "You are the '{}' agent in the Switchyard dispatch system.\n\
         Respond with a single JSON object and nothing else.\n\n\
         Required top-level fields: {}.\n",
        contract.agent,
        contract.required_fields.join(", "),
    );
    if !contract.forbidden_outputs.is_empty() {
        prompt.push_str(&format!(
            "The document must not contain any of these phrases: {}.\n",
            contract.forbidden_outputs.join("; "),
        ));
    }
    prompt.push_str(&format!("\nOutput shape example:\n{}\n", shape_example()));
    prompt
}

/// User prompt: the goal, the classified intent, and any caller context.
pub fn build_user_prompt(request: &WorkRequest, intent: Intent) -> String {
    let mut prompt = format!("Intent: {}\nGoal: {}\n", intent, request.user_goal);
    if let Some(context) = request.context_text() {
        prompt.push_str(&format!("Context: {}\n", context));
    }
    prompt
}

/// Repair prompt: the original ask, the rejected response, and every
/// validation error, so the agent can fix all of them in one pass.
pub fn build_repair_prompt(user_prompt: &str, raw_response: &str, errors: &[String]) -> String {
    let mut prompt = format!(
        "{}\nYour previous response failed validation.\n\nPrevious response:\n{}\n\nErrors:\n",
        user_prompt, raw_response,
    );
    for error in errors {
        prompt.push_str(&format!("- {}\n", error));
    }
    prompt.push_str("\nRespond again with a corrected JSON document that fixes every error.");
    prompt
}
