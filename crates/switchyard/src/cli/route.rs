//! `route` command: run one work request through the dispatch pipeline.

use crate::config::{AgentMode, SwitchyardConfig};
use anyhow::{Context, Result};
use serde_json::json;
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use switchyard_agent::{CommandAgent, GenerationAgent, ScriptedAgent};
use switchyard_contract::ContractStore;
use switchyard_dispatch::{DispatchEngine, DispatchOptions};
use switchyard_ledger::Ledger;
use switchyard_protocol::{validate_request, DispatchReport, DispatchState};

#[derive(Debug, clap::Args)]
pub struct RouteArgs {
    /// Request document path, or `-` for stdin
    pub file: String,

    /// Use a previously recorded override approval for this session/intent
    #[arg(long = "override")]
    pub override_requested: bool,

    /// Allow draft-only intents through a governance hold on this run
    #[arg(long)]
    pub draft_only: bool,

    /// Agent strategy, overriding the config
    #[arg(long)]
    pub agent: Option<AgentMode>,

    /// Generation timeout in seconds, overriding the config
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the full JSON report instead of the summary
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RouteArgs, config: &SwitchyardConfig) -> Result<ExitCode> {
    let raw = read_document(&args.file)?;

    let doc: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            if args.json {
                let out = json!({ "status": "INVALID", "errors": [err.to_string()] });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprintln!("Request document is not valid JSON: {}", err);
            }
            return Ok(ExitCode::from(1));
        }
    };

    let request = match validate_request(&doc) {
        Ok(request) => request,
        Err(errors) => {
            if args.json {
                let out = json!({ "status": "INVALID", "errors": errors });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprintln!("Invalid request document:");
                for error in &errors {
                    eprintln!("  {}", error);
                }
            }
            return Ok(ExitCode::from(1));
        }
    };

    let ledger_path = config.ledger_path();
    let ledger = Ledger::open(&ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", ledger_path.display()))?;
    let contracts = load_contracts(config)?;
    let agent = build_agent(&args, config)?;

    let options = DispatchOptions {
        generation_timeout: Duration::from_secs(
            args.timeout_secs.unwrap_or(config.agent.timeout_seconds),
        ),
        draft_only_auto_allow: args.draft_only || config.policy.draft_only_auto_allow,
    };

    let engine = DispatchEngine::new(ledger, contracts, agent, options);
    let report = engine.dispatch(&request, args.override_requested).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(exit_code_for(&report))
}

fn read_document(file: &str) -> Result<String> {
    if file == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read request from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
    }
}

/// Contracts from the configured store file, or the compiled-in defaults
/// when no file exists yet.
fn load_contracts(config: &SwitchyardConfig) -> Result<ContractStore> {
    let path = &config.contracts.path;
    if path.exists() {
        ContractStore::load(path)
            .with_context(|| format!("Failed to load contracts from {}", path.display()))
    } else {
        Ok(ContractStore::builtin())
    }
}

fn build_agent(args: &RouteArgs, config: &SwitchyardConfig) -> Result<Arc<dyn GenerationAgent>> {
    let mode = args.agent.unwrap_or(config.agent.mode);
    match mode {
        AgentMode::Scripted => match &config.agent.script_path {
            Some(path) if path.exists() => {
                let agent = ScriptedAgent::from_file(path)
                    .with_context(|| format!("Failed to load agent script {}", path.display()))?;
                Ok(Arc::new(agent))
            }
            _ => Ok(Arc::new(ScriptedAgent::default_valid())),
        },
        AgentMode::Command => {
            let command = config.agent.command.as_deref().unwrap_or_default();
            let agent = CommandAgent::from_command_line(command)
                .context("agent.command must name a program when mode = \"command\"")?;
            Ok(Arc::new(agent))
        }
    }
}

/// 0 for every resolved outcome; 2 when the request stayed gated because
/// the requested override had no approval; 1 for an agent fault.
fn exit_code_for(report: &DispatchReport) -> ExitCode {
    if report.status == DispatchState::Gated && report.dispatch.override_denied {
        return ExitCode::from(2);
    }
    match report.status {
        DispatchState::Error => ExitCode::from(1),
        _ => ExitCode::SUCCESS,
    }
}

fn print_summary(report: &DispatchReport) {
    println!(
        "Request {} (session {})",
        report.request_id, report.session_id
    );
    println!(
        "  Intent:    {}{}",
        report.route.intent,
        if report.route.defaulted { " (defaulted)" } else { "" }
    );
    println!("  Agent:     {}", report.route.primary_agent);
    print!("  Gate:      {}", report.route.gate_decision);
    if !report.route.gate_flags.is_empty() {
        print!(" [{}]", report.route.gate_flags.join(", "));
    }
    println!();
    println!("  Status:    {}", report.status);
    if let Some(artifact_id) = &report.dispatch.artifact_id {
        println!("  Artifact:  {}", artifact_id);
    }
    if let Some(task_id) = &report.dispatch.task_id {
        println!("  Task:      {}", task_id);
    }
    if report.dispatch.repair_attempted {
        println!(
            "  Repair:    attempted, {}",
            if report.dispatch.repair_succeeded { "succeeded" } else { "failed" }
        );
    }
    if report.dispatch.draft_only_bypass {
        println!("  Bypass:    draft-only auto-allow");
    }
    println!("  Reason:    {}", report.dispatch.reason);
    println!("  Next step: {}", report.dispatch.next_step);
}
