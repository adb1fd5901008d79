//! Axum router configuration with middleware.
//!
//! `/slack_event` is kept as an alias of `/slack/events` for apps whose
//! Request URL was registered under the older path.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(handlers::slack_events::receive_event))
        .route("/slack_event", post(handlers::slack_events::receive_event))
        .route("/webhook", post(handlers::webhook::trigger_workflow))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness probe.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
