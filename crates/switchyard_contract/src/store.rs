//! The contract store: one declarative output contract per agent.
//!
//! On disk this is a TOML file keyed by agent name. Loading starts from the
//! compiled-in defaults and overlays whatever the file defines, so a partial
//! file never leaves an agent without a contract.

use crate::error::{ContractError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Agents the routing table can select. Each has a compiled-in contract.
pub const KNOWN_AGENTS: &[&str] = &[
    "planner",
    "drafter",
    "sales_desk",
    "researcher",
    "ops_runner",
    "triage",
];

/// Declarative output contract for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContract {
    /// Agent name; on load this is reconciled with the store key.
    #[serde(default)]
    pub agent: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Top-level fields the generated document must carry.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Tokens that must not appear anywhere in the document text.
    #[serde(default)]
    pub forbidden_outputs: Vec<String>,
}

fn default_version() -> u32 {
    1
}

impl AgentContract {
    fn new(agent: &str, required_fields: &[&str], forbidden_outputs: &[&str]) -> Self {
        Self {
            agent: agent.to_string(),
            version: default_version(),
            required_fields: required_fields.iter().map(|s| s.to_string()).collect(),
            forbidden_outputs: forbidden_outputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// All contracts, keyed by agent name.
#[derive(Debug, Clone)]
pub struct ContractStore {
    contracts: BTreeMap<String, AgentContract>,
}

impl Default for ContractStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ContractStore {
    /// The compiled-in contracts for every known agent.
    pub fn builtin() -> Self {
        let defaults = [
            AgentContract::new(
                "planner",
                &["summary", "classification", "outputs"],
                &["wire transfer", "mass email"],
            ),
            AgentContract::new(
                "drafter",
                &["summary", "classification", "outputs"],
                &["mass email", "post publicly", "send immediately"],
            ),
            AgentContract::new(
                "sales_desk",
                &["summary", "classification", "outputs", "next_actions"],
                &["wire transfer", "sign contract", "guaranteed returns"],
            ),
            AgentContract::new(
                "researcher",
                &["summary", "outputs"],
                &["mass email", "wire transfer"],
            ),
            AgentContract::new(
                "ops_runner",
                &["summary", "classification", "outputs"],
                &["rm -rf", "drop table", "delete production"],
            ),
            AgentContract::new(
                "triage",
                &["summary", "classification", "outputs"],
                &["mass email", "wire transfer"],
            ),
        ];

        let contracts = defaults
            .into_iter()
            .map(|c| (c.agent.clone(), c))
            .collect();
        Self { contracts }
    }

    /// Parse a TOML store and overlay it on the builtin defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: BTreeMap<String, AgentContract> =
            toml::from_str(content).map_err(|e| ContractError::Store(e.to_string()))?;

        let mut store = Self::builtin();
        for (agent, mut contract) in parsed {
            contract.agent = agent.clone();
            store.contracts.insert(agent, contract);
        }
        Ok(store)
    }

    /// Load the contract store from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), agents = store.contracts.len(), "Loaded contract store");
        Ok(store)
    }

    /// Save every contract to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(&self.contracts).map_err(|e| ContractError::Store(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, agent: &str) -> Option<&AgentContract> {
        self.contracts.get(agent)
    }

    /// Contract for the agent, or an error naming the agent.
    pub fn contract_for(&self, agent: &str) -> Result<&AgentContract> {
        self.contracts
            .get(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))
    }

    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_known_agent() {
        let store = ContractStore::builtin();
        for agent in KNOWN_AGENTS {
            let contract = store.get(agent).unwrap();
            assert_eq!(contract.agent, *agent);
            assert!(contract.required_fields.contains(&"summary".to_string()));
            assert!(contract.required_fields.contains(&"outputs".to_string()));
        }
    }

    #[test]
    fn test_file_overlays_builtin() {
        let toml_str = r#"
            [drafter]
            version = 3
            required_fields = ["summary"]
            forbidden_outputs = ["mass email"]
        "#;
        let store = ContractStore::from_toml_str(toml_str).unwrap();

        let drafter = store.get("drafter").unwrap();
        assert_eq!(drafter.version, 3);
        assert_eq!(drafter.required_fields, vec!["summary"]);
        // The key wins over any inline agent field.
        assert_eq!(drafter.agent, "drafter");

        // Agents the file does not mention keep their defaults.
        let planner = store.get("planner").unwrap();
        assert_eq!(planner.version, 1);
        assert_eq!(planner.required_fields.len(), 3);
    }

    #[test]
    fn test_unknown_agent_is_an_error() {
        let store = ContractStore::builtin();
        assert!(store.get("nonexistent").is_none());
        let err = store.contract_for("nonexistent").unwrap_err();
        assert!(matches!(err, ContractError::UnknownAgent(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_store_error() {
        let err = ContractStore::from_toml_str("not [ valid toml").unwrap_err();
        assert!(matches!(err, ContractError::Store(_)));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");

        let store = ContractStore::builtin();
        store.save(&path).unwrap();

        let loaded = ContractStore::load(&path).unwrap();
        for agent in KNOWN_AGENTS {
            assert_eq!(loaded.get(agent), store.get(agent));
        }
    }
}
