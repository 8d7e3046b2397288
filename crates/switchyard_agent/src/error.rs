use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The caller-supplied generation timeout expired. Never retried.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn agent command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to the agent: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent command exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("agent returned empty output")]
    EmptyOutput,

    #[error("malformed script file: {0}")]
    BadScript(String),

    #[error("agent output is not valid UTF-8")]
    InvalidUtf8,
}
