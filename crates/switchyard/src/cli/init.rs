//! `init` command: materialize the Switchyard home.

use crate::config::SwitchyardConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use switchyard_contract::ContractStore;
use switchyard_ledger::Ledger;
use switchyard_logging::switchyard_home;

/// Create the home directory, default config, contracts file, and ledger
/// schema. Existing files are left alone so re-running is safe.
pub async fn run(config_path: &Path, config: &SwitchyardConfig) -> Result<ExitCode> {
    let home = switchyard_home();
    std::fs::create_dir_all(&home)
        .with_context(|| format!("Failed to create {}", home.display()))?;
    println!("Home:      {}", home.display());

    if config_path.exists() {
        println!("Config:    {} (kept)", config_path.display());
    } else {
        config.save(config_path)?;
        println!("Config:    {} (created)", config_path.display());
    }

    let contracts_path = &config.contracts.path;
    if contracts_path.exists() {
        println!("Contracts: {} (kept)", contracts_path.display());
    } else {
        if let Some(parent) = contracts_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        ContractStore::builtin()
            .save(contracts_path)
            .with_context(|| format!("Failed to write {}", contracts_path.display()))?;
        println!("Contracts: {} (created)", contracts_path.display());
    }

    let ledger_path = config.ledger_path();
    let ledger = Ledger::open(&ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))?;
    ledger.close().await;
    println!("Ledger:    {}", ledger_path.display());

    Ok(ExitCode::SUCCESS)
}
