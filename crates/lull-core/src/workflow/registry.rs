//! Name -> handler registry for workflows.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use lull_types::error::WorkflowError;
use lull_types::workflow::State;

use super::runner::RunContext;

/// Boxed future returned by a workflow handler.
pub type WorkflowFuture = BoxFuture<'static, Result<State, WorkflowError>>;

/// A registered workflow: takes the run context and initial state, returns
/// the final state.
pub type WorkflowHandler = Arc<dyn Fn(RunContext, State) -> WorkflowFuture + Send + Sync>;

/// Registry of workflow handlers, filled at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    handlers: HashMap<String, WorkflowHandler>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler with
    /// the same name.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(RunContext, State) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<State, WorkflowError>> + Send + 'static,
    {
        let name = name.into();
        let boxed: WorkflowHandler = Arc::new(move |ctx, state| handler(ctx, state).boxed());
        if self.handlers.insert(name.clone(), boxed).is_some() {
            tracing::warn!(workflow = %name, "workflow handler replaced");
        }
        self
    }

    /// Look up a handler by name.
    pub fn get_handler(&self, name: &str) -> Result<WorkflowHandler, WorkflowError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered workflow names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("names", &self.names())
            .finish()
    }
}
