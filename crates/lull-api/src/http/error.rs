//! Application error type mapping to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use lull_infra::slack::signature::SignatureError;
use lull_types::error::WorkflowError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Workflow lookup or submission errors.
    Workflow(WorkflowError),
    /// Request signature verification failure.
    Unauthorized(String),
    /// Body could not be parsed.
    BadRequest(String),
    /// Required Slack credentials are not configured.
    MissingConfig(Vec<&'static str>),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<SignatureError> for AppError {
    fn from(e: SignatureError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Workflow(WorkflowError::NotFound(name)) => (
                StatusCode::NOT_FOUND,
                "WORKFLOW_NOT_FOUND",
                format!("Unknown workflow: {name}"),
            ),
            AppError::Workflow(e) => (StatusCode::INTERNAL_SERVER_ERROR, "WORKFLOW_ERROR", e.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::MissingConfig(vars) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MISSING_CONFIGURATION",
                format!("Missing required environment variables: {}", vars.join(", ")),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(%code, %message, "request failed");
        } else {
            tracing::debug!(%code, %message, "request rejected");
        }

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
