//! Outbound chat platform port.
//!
//! The debounce controller and thread reporters talk to the chat platform
//! only through `ChatApi`; `lull-infra` implements it over the Slack Web API.

use lull_types::error::ChatError;

/// Outbound calls the dispatcher needs from the chat platform.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ChatApi: Send + Sync + 'static {
    /// Add an emoji reaction to a message.
    fn add_reaction(
        &self,
        channel: &str,
        message_id: &str,
        reaction: &str,
    ) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;

    /// Post a message inside the thread anchored at `thread_id`.
    fn post_in_thread(
        &self,
        channel: &str,
        thread_id: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;
}
