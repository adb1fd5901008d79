//! HTTP layer: Slack Events API receiver, webhook trigger, health check.

pub mod error;
pub mod handlers;
pub mod router;
