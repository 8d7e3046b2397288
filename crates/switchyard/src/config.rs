//! Binary configuration: `~/.switchyard/config.toml`.
//!
//! Every field has a serde default so a missing or partial file works. The
//! `SWITCHYARD_HOME` environment variable relocates the whole tree, which
//! the tests use to keep runs hermetic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use switchyard_logging::{default_ledger_path, switchyard_home};

/// Which generation agent strategy the `route` command builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Canned responses; no external process.
    Scripted,
    /// Spawn `agent.command` and talk JSON over stdin/stdout.
    Command,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Scripted => "scripted",
            AgentMode::Command => "command",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scripted" => Ok(AgentMode::Scripted),
            "command" => Ok(AgentMode::Command),
            _ => Err(format!(
                "Invalid agent mode: '{}'. Expected: scripted or command",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// SQLite location: a plain path or a `sqlite:` URL.
    #[serde(default = "default_db_url")]
    pub db_url: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
        }
    }
}

fn default_db_url() -> String {
    format!("sqlite:{}", default_ledger_path().display())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_mode")]
    pub mode: AgentMode,
    /// Command line for `mode = "command"`, split on whitespace.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Canned-response file for `mode = "scripted"` dry runs.
    #[serde(default)]
    pub script_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            mode: default_agent_mode(),
            command: None,
            timeout_seconds: default_timeout_seconds(),
            script_path: None,
        }
    }
}

fn default_agent_mode() -> AgentMode {
    AgentMode::Scripted
}

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    /// Let draft-only intents through a governance hold without an override.
    #[serde(default)]
    pub draft_only_auto_allow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractsSection {
    #[serde(default = "default_contracts_path")]
    pub path: PathBuf,
}

impl Default for ContractsSection {
    fn default() -> Self {
        Self {
            path: default_contracts_path(),
        }
    }
}

fn default_contracts_path() -> PathBuf {
    switchyard_home().join("contracts.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub contracts: ContractsSection,
}

impl SwitchyardConfig {
    /// Load the config, or fall back to all defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Malformed config: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Filesystem path of the ledger database, scheme stripped if present.
    pub fn ledger_path(&self) -> PathBuf {
        let raw = self.ledger.db_url.trim();
        let path = raw.strip_prefix("sqlite://").unwrap_or(raw);
        let path = path.strip_prefix("sqlite:").unwrap_or(path);
        PathBuf::from(path)
    }
}
