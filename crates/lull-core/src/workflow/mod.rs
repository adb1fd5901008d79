//! Workflow registry and runner.
//!
//! - `registry` -- name -> async handler map with typed not-found lookups
//! - `runner` -- `WorkflowEngine::submit`, `RunContext`, `RunHandle`
//! - `reporter` -- where a run's progress and error lines go
//! - `builtin` -- workflows shipped with the binary

pub mod builtin;
pub mod registry;
pub mod reporter;
pub mod runner;

pub use registry::{WorkflowHandler, WorkflowRegistry};
pub use reporter::{LogReporter, ReportKind, RunReporter, ThreadReporter};
pub use runner::{RunContext, RunHandle, WorkflowEngine};
