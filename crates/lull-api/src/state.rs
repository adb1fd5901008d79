//! Application state wiring the debounce pipeline together.
//!
//! The controller is generic over chat client and scheduler; AppState pins
//! it to the Slack Web API client and the tokio scheduler.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::mpsc;

use lull_core::debounce::{DebounceController, DebounceSettings, TokioScheduler};
use lull_core::workflow::builtin::register_builtins;
use lull_core::workflow::{WorkflowEngine, WorkflowRegistry};
use lull_infra::slack::SlackWebClient;
use lull_types::config::LullConfig;
use lull_types::request::PendingRequest;

/// Debounce controller pinned to the production adapters.
pub type SlackController = DebounceController<SlackWebClient, TokioScheduler>;

/// Shared application state for the HTTP handlers and CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LullConfig>,
    pub engine: Arc<WorkflowEngine>,
    pub controller: Arc<SlackController>,
    /// Present when inbound Slack requests must be signature-checked.
    pub signing_secret: Option<Arc<SecretString>>,
}

impl AppState {
    /// Wire the engine, Slack client, and controller from `config`.
    ///
    /// The returned receiver yields fired requests; pass it to
    /// `DebounceController::run_dispatcher`.
    pub fn init(config: LullConfig) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<PendingRequest>)> {
        let engine = Arc::new(WorkflowEngine::new(build_registry()));
        let chat = Arc::new(SlackWebClient::from_config(&config.slack)?);
        let (controller, fired) = DebounceController::new(
            DebounceSettings::from_config(&config),
            chat,
            Arc::clone(&engine),
            TokioScheduler::new(),
        );
        let signing_secret = config
            .slack
            .signing_secret
            .clone()
            .filter(|s| !s.is_empty())
            .map(|s| Arc::new(SecretString::from(s)));

        let state = Self {
            config: Arc::new(config),
            engine,
            controller: Arc::new(controller),
            signing_secret,
        };
        Ok((state, fired))
    }
}

/// Registry with every workflow this binary ships.
pub fn build_registry() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    register_builtins(&mut registry);
    registry
}
