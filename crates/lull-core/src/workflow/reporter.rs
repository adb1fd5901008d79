//! Sinks for a workflow run's progress and error lines.
//!
//! Every line has the shape `[{workflow}, {run_id}] {message}`; error lines
//! carry an `[ERROR] ` marker before the message.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use lull_types::workflow::RunId;

use crate::chat::ChatApi;

/// Severity of a reported line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Progress,
    Error,
}

/// Format one report line.
pub fn format_line(workflow: &str, run_id: RunId, kind: ReportKind, message: &str) -> String {
    match kind {
        ReportKind::Progress => format!("[{workflow}, {run_id}] {message}"),
        ReportKind::Error => format!("[{workflow}, {run_id}] [ERROR] {message}"),
    }
}

/// Destination for the lines a run reports.
///
/// Object-safe so runs can hold an `Arc<dyn RunReporter>` regardless of
/// where they were triggered from. Delivery failures are the reporter's
/// problem; `report` never fails.
pub trait RunReporter: Send + Sync + 'static {
    fn report(&self, kind: ReportKind, line: String) -> BoxFuture<'_, ()>;
}

// ---------------------------------------------------------------------------
// ThreadReporter
// ---------------------------------------------------------------------------

/// Posts report lines into the chat thread that triggered the run.
pub struct ThreadReporter<C: ChatApi> {
    chat: Arc<C>,
    channel: String,
    thread_id: String,
}

impl<C: ChatApi> ThreadReporter<C> {
    pub fn new(chat: Arc<C>, channel: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            chat,
            channel: channel.into(),
            thread_id: thread_id.into(),
        }
    }
}

impl<C: ChatApi> RunReporter for ThreadReporter<C> {
    fn report(&self, _kind: ReportKind, line: String) -> BoxFuture<'_, ()> {
        async move {
            if let Err(e) = self
                .chat
                .post_in_thread(&self.channel, &self.thread_id, &line)
                .await
            {
                tracing::warn!(
                    channel = %self.channel,
                    thread = %self.thread_id,
                    error = %e,
                    "failed to post run report to thread"
                );
            }
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// LogReporter
// ---------------------------------------------------------------------------

/// Writes report lines to the process log. Used for runs triggered outside
/// a chat thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl RunReporter for LogReporter {
    fn report(&self, kind: ReportKind, line: String) -> BoxFuture<'_, ()> {
        match kind {
            ReportKind::Progress => tracing::info!(target: "lull::run", "{line}"),
            ReportKind::Error => tracing::error!(target: "lull::run", "{line}"),
        }
        futures_util::future::ready(()).boxed()
    }
}
