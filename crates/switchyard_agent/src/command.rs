//! Agent backed by an external command.
//!
//! The command receives one JSON envelope on stdin:
//! `{"system_prompt": "...", "user_prompt": "..."}` and must print the
//! generated document to stdout, exiting 0. Stderr is captured for
//! diagnostics. The dispatch engine applies the timeout around each call.

use crate::error::AgentError;
use crate::GenerationAgent;
use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct CommandAgent {
    program: String,
    args: Vec<String>,
}

impl CommandAgent {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }

    /// Split a configured command line on whitespace. Quoting is not
    /// supported; use a wrapper script for anything fancier.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(|s| s.to_string()).collect()))
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[async_trait]
impl GenerationAgent for CommandAgent {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        let envelope = json!({
            "system_prompt": system_prompt,
            "user_prompt": user_prompt,
        })
        .to_string();

        debug!(command = %self.command_line(), "Spawning agent command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AgentError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(envelope.as_bytes()).await?;
            stdin.flush().await?;
            // Close stdin so the child sees EOF.
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %self.command_line(), code = ?output.status.code(), "Agent command failed");
            return Err(AgentError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| AgentError::InvalidUtf8)?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Err(AgentError::EmptyOutput);
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line() {
        let agent = CommandAgent::from_command_line("python3 agent.py --fast").unwrap();
        assert_eq!(agent.command_line(), "python3 agent.py --fast");
        assert!(CommandAgent::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_echo_style_command_round_trip() {
        // `cat` echoes the envelope back; good enough to prove the
        // stdin/stdout plumbing works.
        let agent = CommandAgent::new("cat", Vec::new());
        let raw = agent.generate("sys", "user").await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["system_prompt"], "sys");
        assert_eq!(doc["user_prompt"], "user");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let agent = CommandAgent::new("switchyard-no-such-binary", Vec::new());
        assert!(matches!(
            agent.generate("s", "u").await,
            Err(AgentError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failed() {
        let agent = CommandAgent::new("false", Vec::new());
        // The child may exit before stdin is written, so a broken pipe is
        // also acceptable.
        match agent.generate("s", "u").await {
            Err(AgentError::Failed { .. }) | Err(AgentError::Io(_)) => {}
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
