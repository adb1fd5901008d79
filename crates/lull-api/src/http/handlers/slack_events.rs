//! Slack Events API receiver.
//!
//! Every delivery is acknowledged immediately; the debounce controller does
//! the rest in the background.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use secrecy::ExposeSecret;

use lull_infra::slack::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use lull_types::event::EventEnvelope;

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /slack/events - Receive one Events API delivery.
///
/// The signature is checked against the raw body before anything is parsed
/// when a signing secret is configured. The URL verification handshake is
/// answered even when Slack credentials are missing; every other envelope
/// is rejected with 422 until they are set.
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(secret) = &state.signing_secret {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        signature::verify_request(
            secret.expose_secret().as_bytes(),
            header(TIMESTAMP_HEADER),
            header(SIGNATURE_HEADER),
            &body,
            chrono::Utc::now().timestamp(),
        )?;
    }

    let envelope: EventEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid event payload: {e}")))?;

    if !envelope.is_url_verification() {
        let missing = state.config.slack.missing_credentials();
        if !missing.is_empty() {
            return Err(AppError::MissingConfig(missing));
        }
    }

    let ack = state.controller.handle(&envelope).await;
    Ok(Json(ack.to_json()))
}
