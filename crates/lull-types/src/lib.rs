//! Shared domain types for Lull.
//!
//! This crate contains the types passed between the debounce pipeline's
//! layers: the inbound event envelope, coalescing keys and pending requests,
//! classification decisions, configuration, and error enums.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod request;
pub mod workflow;
