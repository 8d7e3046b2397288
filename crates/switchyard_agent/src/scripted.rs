//! Deterministic stand-in agent for tests and offline runs.

use crate::error::AgentError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::GenerationAgent;

/// Returns queued canned responses in order, wrapping around when the queue
/// is exhausted. Prompts are ignored.
pub struct ScriptedAgent {
    responses: Vec<String>,
    cursor: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Single response, serialized from a JSON document.
    pub fn with_document(doc: &Value) -> Self {
        Self::new(vec![doc.to_string()])
    }

    /// A canned document that satisfies every builtin contract.
    pub fn default_valid() -> Self {
        Self::with_document(&json!({
            "summary": "Scripted response generated without an external agent.",
            "classification": "internal",
            "outputs": [{
                "type": "note",
                "title": "Scripted output",
                "content": "This document was produced by the scripted agent."
            }],
            "next_actions": [{
                "owner_agent": "triage",
                "title": "Review scripted output"
            }]
        }))
    }

    /// Load a script file: a JSON array where each element is either a raw
    /// response string or a document to serialize. A single top-level object
    /// becomes a one-response script.
    pub fn from_file(path: &Path) -> Result<Self, AgentError> {
        let content = std::fs::read_to_string(path)?;
        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| AgentError::BadScript(e.to_string()))?;

        let responses = match parsed {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        };
        Ok(Self::new(responses))
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

#[async_trait]
impl GenerationAgent for ScriptedAgent {
    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, AgentError> {
        if self.responses.is_empty() {
            return Err(AgentError::EmptyOutput);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        debug!(index, total = self.responses.len(), "Scripted response served");
        Ok(self.responses[index].clone())
    }
}
