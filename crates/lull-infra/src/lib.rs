//! Infrastructure layer for Lull.
//!
//! Implements the `ChatApi` port from `lull-core` over the Slack Web API,
//! verifies Slack request signatures, and loads configuration from TOML and
//! the environment.

pub mod config;
pub mod slack;
