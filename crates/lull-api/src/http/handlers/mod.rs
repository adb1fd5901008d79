//! HTTP request handlers.

pub mod slack_events;
pub mod webhook;
