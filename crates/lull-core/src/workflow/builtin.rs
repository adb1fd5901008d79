//! Workflows shipped with the binary.

use lull_types::error::WorkflowError;
use lull_types::workflow::State;
use serde_json::Value;

use super::registry::WorkflowRegistry;
use super::runner::RunContext;

/// Name of the echo workflow.
pub const ECHO: &str = "echo";

/// Name of the pipeline self-check workflow.
pub const HEALTHCHECK: &str = "healthcheck";

/// Register every built-in workflow.
pub fn register_builtins(registry: &mut WorkflowRegistry) {
    registry.register(ECHO, echo).register(HEALTHCHECK, healthcheck);
}

/// Verifies the pipeline end to end and marks the state `status = "ok"`.
async fn healthcheck(ctx: RunContext, mut state: State) -> Result<State, WorkflowError> {
    ctx.report_progress("Running healthcheck").await;
    state.insert("status".to_string(), Value::String("ok".to_string()));
    Ok(state)
}

/// Reports the request text back and, when present, the attachment count.
async fn echo(ctx: RunContext, state: State) -> Result<State, WorkflowError> {
    let text = state
        .get("request_text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.is_empty() {
        ctx.report_progress("(empty request)").await;
    } else {
        ctx.report_progress(text).await;
    }

    if let Some(files) = state.get("attachments").and_then(Value::as_array) {
        ctx.report_progress(format!("{} attachment(s) received", files.len()))
            .await;
    }
    Ok(state)
}
