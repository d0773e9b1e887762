// SPDX-License-Identifier: MIT OR Apache-2.0
//! `probescript` - run a script graph from the command line
//!
//! Loads a script from its JSON form and runs it from an entry node with the
//! in-process host collaborators. No agent is attached, so target nodes fail
//! the run with "No target session attached". Each run's result is printed
//! to stdout as pretty JSON; logs go to stderr.

use clap::Parser;
use probescript_graph::{NodeId, Script, Value};
use probescript_runtime::{find_entry, Engine, InMemoryUiState, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run a probescript script graph
#[derive(Parser, Debug)]
#[command(name = "probescript", version, about, long_about = None)]
struct Cli {
    /// Path to the script JSON file
    script: PathBuf,
    /// Entry node to start from, defaults to the first entry node
    #[arg(long)]
    entry: Option<String>,
    /// Trigger value as JSON
    #[arg(long)]
    value: Option<String>,
    /// Component that fired a UI event
    #[arg(long)]
    component: Option<String>,
    /// Initial UI component values as a JSON object
    #[arg(long)]
    ui: Option<String>,
    /// Runtime limits file (RON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Consecutive runs sharing one variable store
    #[arg(long, default_value_t = 1)]
    runs: u32,
}

fn load_script(path: &Path) -> Result<Script, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}

fn parse_json(flag: &str, text: Option<&str>) -> Result<Value, String> {
    let Some(text) = text else {
        return Ok(Value::Null);
    };
    serde_json::from_str::<serde_json::Value>(text)
        .map(|json| Value::from_json(&json))
        .map_err(|e| format!("--{flag} is not valid JSON: {e}"))
}

fn ui_state(components: Value) -> Result<InMemoryUiState, String> {
    let ui = InMemoryUiState::new();
    match components {
        Value::Object(components) => {
            for (id, value) in components {
                ui.register(id, value);
            }
        }
        Value::Null => {}
        other => return Err(format!("--ui must be a JSON object, got {}", other.value_type())),
    }
    Ok(ui)
}

/// Returns whether the last run completed
async fn run(cli: Cli) -> Result<bool, String> {
    let script = load_script(&cli.script)?;
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)
            .map_err(|e| format!("Failed to load config {}: {e}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let entry = match cli.entry {
        Some(id) => NodeId::from(id),
        None => find_entry(&script, None)
            .map(|node| node.id.clone())
            .ok_or_else(|| format!("Script '{}' has no entry node", script.name))?,
    };
    let value = parse_json("value", cli.value.as_deref())?;
    let ui = ui_state(parse_json("ui", cli.ui.as_deref())?)?;

    let engine = Engine::new(config).with_ui(Arc::new(ui));
    tracing::info!(
        script = %script.name,
        nodes = script.node_count(),
        entry = %entry,
        "script loaded"
    );

    let mut success = true;
    for _ in 0..cli.runs.max(1) {
        let result = engine
            .run(&script, &entry, value.clone(), cli.component.as_deref())
            .await;
        success = result.success();
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Failed to encode result: {e}"))?;
        println!("{json}");
    }
    Ok(success)
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("probescript=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(2);
        }
    }
}
