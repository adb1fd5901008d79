//! SlackWebClient -- [`ChatApi`] over the Slack Web API.
//!
//! Uses `reactions.add` for acknowledgments and `chat.postMessage` with
//! `thread_ts` for notices and run reports. The bot token is held as a
//! [`SecretString`] and only exposed when building the `Authorization`
//! header.

use std::time::Duration;

use lull_core::chat::ChatApi;
use lull_types::config::{ENV_BOT_TOKEN, SlackConfig};
use lull_types::error::ChatError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

/// Envelope every Web API method answers with.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client.
///
/// Does not derive Debug: the token must never reach the logs.
pub struct SlackWebClient {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
}

impl SlackWebClient {
    /// Per-call timeout.
    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a client against the public Slack API.
    pub fn new(token: SecretString) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| ChatError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            token,
            base_url: "https://slack.com/api".to_string(),
        })
    }

    /// Build from config. A missing token is not an error here; every call
    /// fails with `ChatError::MissingCredential` instead.
    pub fn from_config(config: &SlackConfig) -> Result<Self, ChatError> {
        let token = SecretString::from(config.bot_token.clone().unwrap_or_default());
        Ok(Self::new(token)?.with_base_url(config.api_base_url.clone()))
    }

    /// Override the base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// POST a JSON body to a Web API method and check the `ok` flag.
    async fn call(&self, method: &str, body: Value) -> Result<(), ChatError> {
        let token = self.token.expose_secret();
        if token.trim().is_empty() {
            return Err(ChatError::MissingCredential(ENV_BOT_TOKEN));
        }

        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Http(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ChatError::Http(format!("{method} HTTP {status}: {error_body}")));
        }

        let reply: SlackResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Http(format!("failed to parse {method} response: {e}")))?;
        if reply.ok {
            tracing::debug!(%method, "slack call succeeded");
            Ok(())
        } else {
            Err(ChatError::Api {
                method: method.to_string(),
                error: reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            })
        }
    }
}

impl ChatApi for SlackWebClient {
    async fn add_reaction(
        &self,
        channel: &str,
        message_id: &str,
        reaction: &str,
    ) -> Result<(), ChatError> {
        self.call(
            "reactions.add",
            json!({ "channel": channel, "timestamp": message_id, "name": reaction }),
        )
        .await
    }

    async fn post_in_thread(
        &self,
        channel: &str,
        thread_id: &str,
        text: &str,
    ) -> Result<(), ChatError> {
        self.call(
            "chat.postMessage",
            json!({ "channel": channel, "thread_ts": thread_id, "text": text }),
        )
        .await
    }
}
