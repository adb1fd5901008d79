//! CLI workflow subcommands: list registered workflows, run one locally.

use std::sync::Arc;

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use lull_core::workflow::{ReportKind, RunReporter, WorkflowEngine};
use lull_types::error::WorkflowError;
use lull_types::workflow::State;

/// List registered workflows.
pub fn list_workflows(engine: &WorkflowEngine, json: bool) -> Result<()> {
    let names = engine.registry().names();

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    if names.is_empty() {
        println!();
        println!("  No workflows registered.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Workflow").fg(Color::Cyan)]);
    for name in &names {
        table.add_row(vec![Cell::new(name)]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Run a workflow to completion in the foreground.
///
/// Progress lines go to stdout, error lines to stderr. The final state is
/// printed as JSON.
pub async fn run_workflow(engine: &WorkflowEngine, name: &str, pairs: &[String]) -> Result<()> {
    let state = parse_state_pairs(pairs)?;

    let handle = match engine.submit(name, state, Arc::new(ConsoleReporter)) {
        Ok(handle) => handle,
        Err(WorkflowError::NotFound(_)) => {
            bail!(
                "Unknown workflow: {name} (available: {})",
                engine.registry().names().join(", ")
            )
        }
        Err(e) => return Err(e.into()),
    };

    let final_state = handle.wait().await?;
    println!("{}", serde_json::to_string_pretty(&final_state)?);
    Ok(())
}

/// Parse `key=value` pairs into a state object. Values are kept as strings.
pub fn parse_state_pairs(pairs: &[String]) -> Result<State> {
    let mut state = State::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid --state value (expected key=val): {pair}");
        };
        if key.is_empty() {
            bail!("invalid --state value (empty key): {pair}");
        }
        state.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(state)
}

/// Reports run lines to the terminal.
struct ConsoleReporter;

impl RunReporter for ConsoleReporter {
    fn report(&self, kind: ReportKind, line: String) -> BoxFuture<'_, ()> {
        match kind {
            ReportKind::Progress => println!("  {line}"),
            ReportKind::Error => eprintln!("  {}", style(line).red()),
        }
        futures_util::future::ready(()).boxed()
    }
}
