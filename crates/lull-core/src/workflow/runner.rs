//! Workflow engine: resolves a handler, assigns a run id, and runs it in the
//! background.
//!
//! # Run lifecycle
//!
//! 1. `submit` resolves the handler (unknown name -> `WorkflowError::NotFound`,
//!    nothing spawned).
//! 2. A fresh run id is generated and `run_id` / `workflow_name` are injected
//!    into the initial state.
//! 3. The handler is spawned on the runtime; `submit` returns immediately.
//! 4. The outcome is logged. Failures are also reported through the run's
//!    reporter as an `[ERROR]` line.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use lull_types::error::WorkflowError;
use lull_types::workflow::{RunId, State};
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::registry::WorkflowRegistry;
use super::reporter::{ReportKind, RunReporter, format_line};

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Handle given to a running workflow for identity and reporting.
#[derive(Clone)]
pub struct RunContext {
    run_id: RunId,
    workflow_name: String,
    reporter: Arc<dyn RunReporter>,
}

impl RunContext {
    pub fn new(run_id: RunId, workflow_name: impl Into<String>, reporter: Arc<dyn RunReporter>) -> Self {
        Self {
            run_id,
            workflow_name: workflow_name.into(),
            reporter,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Report a progress line.
    pub async fn report_progress(&self, message: impl AsRef<str>) {
        self.report(ReportKind::Progress, message.as_ref()).await;
    }

    /// Report an error line without ending the run.
    pub async fn report_error(&self, message: impl AsRef<str>) {
        self.report(ReportKind::Error, message.as_ref()).await;
    }

    /// Build the error a handler returns to end the run as failed.
    pub fn fail(&self, message: impl Into<String>) -> WorkflowError {
        let message = message.into();
        tracing::debug!(run_id = %self.run_id, workflow = %self.workflow_name, %message, "workflow failing");
        WorkflowError::Failed(message)
    }

    async fn report(&self, kind: ReportKind, message: &str) {
        let line = format_line(&self.workflow_name, self.run_id, kind, message);
        self.reporter.report(kind, line).await;
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("workflow_name", &self.workflow_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RunHandle
// ---------------------------------------------------------------------------

/// A submitted run. Dropping the handle detaches the run; it keeps going.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: RunId,
    task: JoinHandle<Result<State, WorkflowError>>,
}

impl RunHandle {
    /// Wait for the run to finish and return its final state.
    pub async fn wait(self) -> Result<State, WorkflowError> {
        self.task
            .await
            .map_err(|e| WorkflowError::Handler(format!("run task aborted: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Submits workflow runs against a fixed registry.
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    registry: Arc<WorkflowRegistry>,
}

impl WorkflowEngine {
    pub fn new(registry: WorkflowRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Start `workflow_name` with `initial_state` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(
        &self,
        workflow_name: &str,
        initial_state: State,
        reporter: Arc<dyn RunReporter>,
    ) -> Result<RunHandle, WorkflowError> {
        let handler = self.registry.get_handler(workflow_name)?;
        let run_id = Uuid::now_v7();

        let mut state = initial_state;
        state.insert("run_id".to_string(), Value::String(run_id.to_string()));
        state.insert(
            "workflow_name".to_string(),
            Value::String(workflow_name.to_string()),
        );

        let ctx = RunContext::new(run_id, workflow_name, reporter);
        tracing::info!(%run_id, workflow = %workflow_name, "workflow run started");

        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(handler(ctx.clone(), state))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(WorkflowError::Handler("handler panicked".to_string())));

            match &outcome {
                Ok(_) => {
                    tracing::info!(run_id = %ctx.run_id, workflow = %ctx.workflow_name, "workflow run completed");
                }
                Err(WorkflowError::Failed(message)) => {
                    tracing::warn!(run_id = %ctx.run_id, workflow = %ctx.workflow_name, %message, "workflow run failed");
                    ctx.report_error(message).await;
                }
                Err(e) => {
                    tracing::error!(run_id = %ctx.run_id, workflow = %ctx.workflow_name, error = %e, "workflow run errored");
                    ctx.report_error(e.to_string()).await;
                }
            }
            outcome
        });

        Ok(RunHandle { run_id, task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::RecordingChat;
    use crate::workflow::reporter::{LogReporter, ThreadReporter};
    use serde_json::json;

    fn engine() -> WorkflowEngine {
        let mut registry = WorkflowRegistry::new();
        registry
            .register("shout", |ctx: RunContext, mut state: State| async move {
                let text = state
                    .get("request_text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_uppercase();
                ctx.report_progress(&text).await;
                state.insert("result".to_string(), json!(text));
                Ok(state)
            })
            .register("broken", |ctx: RunContext, _state| async move {
                Err(ctx.fail("no can do"))
            })
            .register("panics", |_ctx, _state: State| async move {
                if true {
                    panic!("boom");
                }
                Ok(State::new())
            });
        WorkflowEngine::new(registry)
    }

    #[tokio::test]
    async fn test_submit_unknown_is_not_found() {
        let result = engine().submit("nope", State::new(), Arc::new(LogReporter));
        assert!(matches!(result, Err(WorkflowError::NotFound(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn test_submit_injects_identity_and_reports() {
        let chat = Arc::new(RecordingChat::new());
        let reporter = Arc::new(ThreadReporter::new(Arc::clone(&chat), "C1", "1.0"));
        let mut state = State::new();
        state.insert("request_text".to_string(), json!("hello"));

        let handle = engine().submit("shout", state, reporter).unwrap();
        let run_id = handle.run_id;
        let final_state = handle.wait().await.unwrap();

        assert_eq!(final_state["run_id"], json!(run_id.to_string()));
        assert_eq!(final_state["workflow_name"], json!("shout"));
        assert_eq!(final_state["result"], json!("HELLO"));
        assert_eq!(chat.posts(), vec![format!("[shout, {run_id}] HELLO")]);
    }

    #[tokio::test]
    async fn test_failed_run_reports_error_line() {
        let chat = Arc::new(RecordingChat::new());
        let reporter = Arc::new(ThreadReporter::new(Arc::clone(&chat), "C1", "1.0"));
        let handle = engine().submit("broken", State::new(), reporter).unwrap();
        let run_id = handle.run_id;

        let result = handle.wait().await;
        assert!(matches!(result, Err(WorkflowError::Failed(m)) if m == "no can do"));
        assert_eq!(chat.posts(), vec![format!("[broken, {run_id}] [ERROR] no can do")]);
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_error() {
        let handle = engine()
            .submit("panics", State::new(), Arc::new(LogReporter))
            .unwrap();
        assert!(matches!(handle.wait().await, Err(WorkflowError::Handler(_))));
    }

    #[tokio::test]
    async fn test_run_ids_are_unique() {
        let engine = engine();
        let a = engine.submit("shout", State::new(), Arc::new(LogReporter)).unwrap();
        let b = engine.submit("shout", State::new(), Arc::new(LogReporter)).unwrap();
        assert_ne!(a.run_id, b.run_id);
    }
}
