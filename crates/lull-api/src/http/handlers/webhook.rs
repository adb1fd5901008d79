//! Generic workflow trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use lull_core::workflow::LogReporter;
use lull_types::workflow::{WebhookRequest, WebhookResponse};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /webhook - Start a workflow run by name.
///
/// Returns the run id as soon as the run is spawned. Progress goes to the
/// log since there is no chat thread to report into.
pub async fn trigger_workflow(
    State(state): State<AppState>,
    Json(request): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, AppError> {
    let handle = state.engine.submit(
        &request.workflow_name,
        request.initial_state,
        Arc::new(LogReporter),
    )?;

    tracing::info!(
        workflow = %request.workflow_name,
        run_id = %handle.run_id,
        "workflow triggered via webhook"
    );
    Ok(Json(WebhookResponse {
        run_id: handle.run_id,
    }))
}
