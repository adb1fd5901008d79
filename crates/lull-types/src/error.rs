use thiserror::Error;

/// Errors related to workflow lookup and execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("unknown workflow: {0}")]
    NotFound(String),

    /// The handler gave up deliberately (via `RunContext::fail`).
    #[error("workflow failed: {0}")]
    Failed(String),

    /// The handler errored or its task panicked.
    #[error("workflow handler error: {0}")]
    Handler(String),
}

/// Errors from outbound chat-platform calls.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("http error: {0}")]
    Http(String),

    /// The platform answered but rejected the call.
    #[error("{method} rejected: {error}")]
    Api { method: String, error: String },

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}
