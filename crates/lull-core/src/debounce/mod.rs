//! Debounce pipeline: classify an event, coalesce it into a pending request,
//! and dispatch the request once its cooldown passes without interruption.
//!
//! - `classifier` -- pure event -> `Decision` mapping
//! - `timer` -- scheduler abstraction (tokio-backed and manual)
//! - `store` -- pending requests with per-key cancellable timers
//! - `controller` -- ties the three together and dispatches fired requests

pub mod classifier;
pub mod controller;
pub mod store;
pub mod timer;

pub use classifier::Classifier;
pub use controller::{DebounceController, DebounceSettings, PROCESSING_NOTICE};
pub use store::CoalescingStore;
pub use timer::{ManualScheduler, Scheduler, TokioScheduler};
