//! Business logic for Lull.
//!
//! This crate defines the `ChatApi` port that the infrastructure layer
//! implements, plus everything that does not touch the network: event
//! classification, the coalescing store and its timers, the debounce
//! controller, and the workflow registry and runner. It depends only on
//! `lull-types` -- never on `lull-infra`.

pub mod chat;
pub mod debounce;
pub mod workflow;
