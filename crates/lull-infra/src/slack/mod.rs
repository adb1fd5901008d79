//! Slack adapters.
//!
//! - `client` -- `SlackWebClient`, the `ChatApi` implementation
//! - `signature` -- `v0` request signature verification

pub mod client;
pub mod signature;

pub use client::SlackWebClient;
