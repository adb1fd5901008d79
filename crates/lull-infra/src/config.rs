//! Configuration loader for Lull.
//!
//! Reads an optional TOML file into [`LullConfig`], then applies environment
//! overrides. Falls back to defaults when the file is missing or malformed;
//! only an unparseable environment value is an error.

use std::path::Path;

use lull_types::config::{ENV_BOT_TOKEN, ENV_BOT_USER_ID, LullConfig};

/// Debounce window in seconds (float).
pub const ENV_COOLDOWN_SECONDS: &str = "SLACK_COOLDOWN_SECONDS";
/// Signing secret for inbound request verification.
pub const ENV_SIGNING_SECRET: &str = "SLACK_SIGNING_SECRET";
/// Web API base URL override.
pub const ENV_API_BASE_URL: &str = "SLACK_API_BASE_URL";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lull.toml";

/// Errors raised while assembling the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Load the config file at `path`.
///
/// - Missing file: debug log, defaults.
/// - Unreadable or malformed file: warning, defaults.
pub async fn load_config_file(path: &Path) -> LullConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return LullConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return LullConfig::default();
        }
    };

    match toml::from_str::<LullConfig>(&content) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", path.display());
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            LullConfig::default()
        }
    }
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Set variables win over file values. Empty credential variables are kept
/// as empty and later reported as missing.
pub fn apply_env_overrides<F>(mut config: LullConfig, lookup: F) -> Result<LullConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(ENV_BOT_TOKEN) {
        config.slack.bot_token = Some(token);
    }
    if let Some(user_id) = lookup(ENV_BOT_USER_ID) {
        config.slack.bot_user_id = Some(user_id);
    }
    if let Some(secret) = lookup(ENV_SIGNING_SECRET) {
        config.slack.signing_secret = Some(secret).filter(|s| !s.is_empty());
    }
    if let Some(url) = lookup(ENV_API_BASE_URL).filter(|u| !u.is_empty()) {
        config.slack.api_base_url = url;
    }
    if let Some(raw) = lookup(ENV_COOLDOWN_SECONDS) {
        config.debounce.cooldown_secs = parse_cooldown(&raw)?;
    }
    Ok(config)
}

/// Load the file (if any) and apply overrides from the process environment.
pub async fn load_config(path: &Path) -> Result<LullConfig, ConfigError> {
    let config = load_config_file(path).await;
    apply_env_overrides(config, |var| std::env::var(var).ok())
}

fn parse_cooldown(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEnv {
        var: ENV_COOLDOWN_SECONDS,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let secs: f64 = raw.trim().parse().map_err(|_| invalid("not a number"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid("must be a non-negative number of seconds"));
    }
    Ok(secs)
}
