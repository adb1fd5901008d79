//! Workflow run types shared by the engine and the HTTP layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Workflow state: a JSON object threaded through a handler.
pub type State = Map<String, Value>;

/// Identifier of one workflow run.
pub type RunId = Uuid;

/// Body of `POST /webhook`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRequest {
    /// Name of the registered workflow to run.
    pub workflow_name: String,
    #[serde(default)]
    pub initial_state: State,
}

/// Response of `POST /webhook`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub run_id: RunId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_request_defaults_state() {
        let req: WebhookRequest =
            serde_json::from_value(json!({"workflow_name": "echo"})).unwrap();
        assert_eq!(req.workflow_name, "echo");
        assert!(req.initial_state.is_empty());
    }

    #[test]
    fn test_webhook_request_rejects_non_object_state() {
        let result: Result<WebhookRequest, _> =
            serde_json::from_value(json!({"workflow_name": "echo", "initial_state": [1]}));
        assert!(result.is_err());
    }
}
