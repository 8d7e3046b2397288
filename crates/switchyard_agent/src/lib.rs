//! Generation agent strategies.
//!
//! The dispatch engine talks to exactly one [`GenerationAgent`], chosen at
//! startup and passed in as `Arc<dyn GenerationAgent>`. Strategies never
//! apply their own timeout; the engine wraps each call.

mod command;
mod error;
mod prompt;
mod scripted;

pub use command::CommandAgent;
pub use error::AgentError;
pub use prompt::{build_repair_prompt, build_system_prompt, build_user_prompt};
pub use scripted::ScriptedAgent;

use async_trait::async_trait;

/// A single generation call. One call in flight per dispatch; the raw text
/// comes back unparsed so the repair loop can see exactly what the agent
/// said.
#[async_trait]
pub trait GenerationAgent: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, AgentError>;
}
