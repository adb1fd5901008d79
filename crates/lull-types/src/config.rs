//! Configuration types for Lull.
//!
//! `LullConfig` is the top-level `lull.toml`. Every field has a default so an
//! empty or missing file yields a usable configuration; Slack credentials are
//! normally supplied through the environment instead (see `lull-infra::config`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the Slack bot token.
pub const ENV_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
/// Environment variable holding the bot's own Slack user id.
pub const ENV_BOT_USER_ID: &str = "SLACK_BOT_USER_ID";

/// Top-level configuration. Read once at startup; not hot-reloadable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LullConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Chat platform credentials and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token used for outbound Web API calls.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// The bot's own user id; defines the `<@ID>` mention marker.
    #[serde(default)]
    pub bot_user_id: Option<String>,
    /// Signing secret for inbound request verification. Verification is
    /// skipped when unset.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Web API base URL (overridable for tests and proxies).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Reaction name used to acknowledge accepted events.
    #[serde(default = "default_ack_reaction")]
    pub ack_reaction: String,
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_ack_reaction() -> String {
    "thumbsup".to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_user_id: None,
            signing_secret: None,
            api_base_url: default_api_base_url(),
            ack_reaction: default_ack_reaction(),
        }
    }
}

impl SlackConfig {
    /// Names of the required credential variables that are unset or empty,
    /// in a stable order.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.bot_token) {
            missing.push(ENV_BOT_TOKEN);
        }
        if is_blank(&self.bot_user_id) {
            missing.push(ENV_BOT_USER_ID);
        }
        missing
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Debounce window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period, in seconds, before a pending request fires.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
}

fn default_cooldown_secs() -> f64 {
    30.0
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl DebounceConfig {
    /// Cooldown as a `Duration`. Negative and NaN values clamp to zero;
    /// values too large for a `Duration` saturate to `Duration::MAX`.
    pub fn cooldown(&self) -> Duration {
        let secs = self.cooldown_secs;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
