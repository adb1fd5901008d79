//! Debounce controller: routes classified events into the coalescing store
//! and dispatches requests whose cooldown elapsed.
//!
//! Request lifecycle per coalescing key:
//!
//! ```text
//! absent --NewRequest--> pending --Edit/ThreadReply--> pending
//!                           |--cooldown elapsed--> dispatched
//!                           `--Delete-----------> deleted
//! ```
//!
//! `dispatched` and `deleted` are terminal: the record is gone, so later
//! edits and replies for the key are orphans and are ignored.

use std::sync::Arc;
use std::time::Duration;

use lull_types::config::LullConfig;
use lull_types::error::WorkflowError;
use lull_types::event::EventEnvelope;
use lull_types::request::{AckResult, Decision, PendingRequest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatApi;
use crate::workflow::{RunHandle, ThreadReporter, WorkflowEngine};

use super::classifier::Classifier;
use super::store::CoalescingStore;
use super::timer::Scheduler;

/// Posted in the request thread when its cooldown elapses.
pub const PROCESSING_NOTICE: &str = "Processing your request...";

/// Notice posted when the requested workflow is not registered.
pub fn unknown_workflow_notice(name: &str) -> String {
    format!("Unknown workflow: {name}")
}

/// Settings the controller reads once at construction.
#[derive(Debug, Clone)]
pub struct DebounceSettings {
    /// Bot user id; defines the mention marker.
    pub bot_user_id: String,
    /// Quiet period before a pending request fires.
    pub cooldown: Duration,
    /// Reaction used to acknowledge accepted events.
    pub ack_reaction: String,
}

impl DebounceSettings {
    pub fn from_config(config: &LullConfig) -> Self {
        Self {
            bot_user_id: config.slack.bot_user_id.clone().unwrap_or_default(),
            cooldown: config.debounce.cooldown(),
            ack_reaction: config.slack.ack_reaction.clone(),
        }
    }
}

/// Turns a stream of chat events into at most one workflow run per request.
pub struct DebounceController<C: ChatApi, S: Scheduler> {
    settings: DebounceSettings,
    classifier: Classifier,
    store: CoalescingStore<S>,
    chat: Arc<C>,
    engine: Arc<WorkflowEngine>,
}

impl<C: ChatApi, S: Scheduler> DebounceController<C, S> {
    /// Build a controller. The returned receiver yields requests whose
    /// cooldown elapsed; feed it to `run_dispatcher`.
    pub fn new(
        settings: DebounceSettings,
        chat: Arc<C>,
        engine: Arc<WorkflowEngine>,
        scheduler: S,
    ) -> (Self, mpsc::UnboundedReceiver<PendingRequest>) {
        let (store, fired) = CoalescingStore::new(scheduler);
        let controller = Self {
            classifier: Classifier::new(&settings.bot_user_id),
            settings,
            store,
            chat,
            engine,
        };
        (controller, fired)
    }

    pub fn store(&self) -> &CoalescingStore<S> {
        &self.store
    }

    /// Process one inbound envelope.
    ///
    /// Never fails: irrelevant events, orphans, and chat API errors are
    /// logged and the delivery is still acknowledged. Reactions are sent
    /// from spawned tasks, so this returns without waiting on the chat
    /// platform. Must be called from within a tokio runtime.
    pub async fn handle(&self, envelope: &EventEnvelope) -> AckResult {
        if envelope.is_url_verification() {
            return AckResult::Challenge(envelope.challenge.clone().unwrap_or_default());
        }
        let Some(event) = envelope.event.as_ref() else {
            tracing::trace!(kind = ?envelope.kind, "envelope without event, ignoring");
            return AckResult::Ok;
        };

        let cooldown = self.settings.cooldown;
        match self.classifier.classify(event) {
            Decision::Ignore => {
                tracing::trace!(kind = ?event.kind, subtype = ?event.subtype, "event ignored");
            }
            Decision::NewRequest(request) => {
                let key = request.key.clone();
                let workflow = request.target_workflow.clone();
                if self.store.create_or_ignore(request, cooldown) {
                    tracing::info!(%key, %workflow, "new request accepted");
                    self.acknowledge(&key.conversation_id, &key.anchor_id);
                }
            }
            Decision::Edit {
                key,
                new_text,
                new_attachments,
            } => {
                let applied = self.store.mutate_if_present(
                    &key,
                    |request| request.apply_edit(new_text, new_attachments),
                    cooldown,
                );
                if applied {
                    tracing::info!(%key, "pending request edited");
                } else {
                    tracing::debug!(%key, "edit for unknown request ignored");
                }
            }
            Decision::ThreadReply {
                parent_key,
                reply_id,
                appended_text,
                appended_attachments,
            } => {
                let applied = self.store.mutate_if_present(
                    &parent_key,
                    |request| request.append_reply(&appended_text, appended_attachments),
                    cooldown,
                );
                if applied {
                    tracing::info!(key = %parent_key, %reply_id, "thread reply appended");
                    self.acknowledge(&parent_key.conversation_id, &reply_id);
                } else {
                    tracing::debug!(key = %parent_key, %reply_id, "reply to unknown request ignored");
                }
            }
            Decision::Delete { key } => {
                if self.store.remove_if_present(&key).is_some() {
                    tracing::info!(%key, "pending request deleted before dispatch");
                }
            }
        }
        AckResult::Ok
    }

    /// Hand a fired request to the workflow engine.
    ///
    /// Posts the processing notice, then submits the run with a reporter
    /// bound to the request thread. Returns `None` when nothing was started.
    pub async fn dispatch(&self, request: PendingRequest) -> Option<RunHandle> {
        let channel = &request.key.conversation_id;
        let thread = &request.key.anchor_id;
        self.notify(channel, thread, PROCESSING_NOTICE).await;

        let reporter = Arc::new(ThreadReporter::new(
            Arc::clone(&self.chat),
            channel.as_str(),
            thread.as_str(),
        ));
        match self
            .engine
            .submit(&request.target_workflow, request.to_payload(), reporter)
        {
            Ok(handle) => {
                tracing::info!(
                    key = %request.key,
                    workflow = %request.target_workflow,
                    run_id = %handle.run_id,
                    "request dispatched"
                );
                Some(handle)
            }
            Err(WorkflowError::NotFound(name)) => {
                tracing::warn!(key = %request.key, workflow = %name, "request names unknown workflow");
                self.notify(channel, thread, &unknown_workflow_notice(&name))
                    .await;
                None
            }
            Err(e) => {
                tracing::error!(key = %request.key, error = %e, "failed to submit workflow run");
                None
            }
        }
    }

    /// Dispatch fired requests until `shutdown` is cancelled or the store is
    /// dropped. On shutdown, requests still pending are discarded.
    pub async fn run_dispatcher(
        self: Arc<Self>,
        mut fired: mpsc::UnboundedReceiver<PendingRequest>,
        shutdown: CancellationToken,
    ) {
        tracing::debug!("dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = fired.recv() => {
                    let Some(request) = next else { break };
                    let controller = Arc::clone(&self);
                    tokio::spawn(async move {
                        controller.dispatch(request).await;
                    });
                }
            }
        }

        let dropped = self.store.clear();
        if dropped > 0 {
            tracing::warn!(dropped, "shutting down with pending requests, discarding them");
        }
        tracing::debug!("dispatcher stopped");
    }

    /// Add the ack reaction in the background; `handle` never waits on it.
    fn acknowledge(&self, channel: &str, message_id: &str) {
        let chat = Arc::clone(&self.chat);
        let reaction = self.settings.ack_reaction.clone();
        let channel = channel.to_string();
        let message_id = message_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = chat.add_reaction(&channel, &message_id, &reaction).await {
                tracing::warn!(%channel, %message_id, error = %e, "failed to acknowledge message");
            }
        });
    }

    async fn notify(&self, channel: &str, thread_id: &str, text: &str) {
        if let Err(e) = self.chat.post_in_thread(channel, thread_id, text).await {
            tracing::warn!(%channel, %thread_id, error = %e, "failed to post notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{ChatCall, RecordingChat};
    use crate::debounce::timer::ManualScheduler;
    use crate::workflow::WorkflowRegistry;
    use lull_types::request::CoalescingKey;
    use lull_types::workflow::State;
    use serde_json::{Value, json};

    const BOT: &str = "U_BOT";

    struct Harness {
        controller: DebounceController<RecordingChat, ManualScheduler>,
        fired: mpsc::UnboundedReceiver<PendingRequest>,
        chat: Arc<RecordingChat>,
        runs: mpsc::UnboundedReceiver<State>,
    }

    fn harness_with(chat: RecordingChat, cooldown: Duration) -> Harness {
        let (runs_tx, runs) = mpsc::unbounded_channel();
        let mut registry = WorkflowRegistry::new();
        registry.register("greet", move |_ctx, state: State| {
            let runs_tx = runs_tx.clone();
            async move {
                let _ = runs_tx.send(state.clone());
                Ok(state)
            }
        });

        let chat = Arc::new(chat);
        let settings = DebounceSettings {
            bot_user_id: BOT.to_string(),
            cooldown,
            ack_reaction: "thumbsup".to_string(),
        };
        let (controller, fired) = DebounceController::new(
            settings,
            Arc::clone(&chat),
            Arc::new(WorkflowEngine::new(registry)),
            ManualScheduler::new(),
        );
        Harness {
            controller,
            fired,
            chat,
            runs,
        }
    }

    fn harness(cooldown: Duration) -> Harness {
        harness_with(RecordingChat::new(), cooldown)
    }

    impl Harness {
        async fn send(&self, event: Value) -> AckResult {
            let envelope: EventEnvelope =
                serde_json::from_value(json!({"type": "event_callback", "event": event})).unwrap();
            let ack = self.controller.handle(&envelope).await;
            settle().await;
            ack
        }

        /// Advance the clock and dispatch whatever fired, waiting for each run.
        async fn advance(&mut self, by: Duration) -> Vec<State> {
            self.controller.store().scheduler().advance(by);
            let mut handles = Vec::new();
            while let Ok(request) = self.fired.try_recv() {
                if let Some(handle) = self.controller.dispatch(request).await {
                    handles.push(handle);
                }
            }
            for handle in handles {
                handle.wait().await.unwrap();
            }
            let mut states = Vec::new();
            while let Ok(state) = self.runs.try_recv() {
                states.push(state);
            }
            states
        }
    }

    /// Let spawned acknowledgements run on the test runtime.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn mention(ts: &str, text: &str) -> Value {
        json!({"type": "app_mention", "channel": "C1", "user": "U_USER", "ts": ts, "text": text})
    }

    fn edit(ts: &str, text: &str) -> Value {
        json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C1",
            "ts": "9999.9",
            "message": {"ts": ts, "text": text},
        })
    }

    fn reply(ts: &str, parent: &str, text: &str) -> Value {
        json!({"type": "message", "channel": "C1", "user": "U_USER", "ts": ts, "thread_ts": parent, "text": text})
    }

    fn delete(ts: &str) -> Value {
        json!({"type": "message", "subtype": "message_deleted", "channel": "C1", "deleted_ts": ts})
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let h = harness(Duration::ZERO);
        let envelope: EventEnvelope =
            serde_json::from_value(json!({"type": "url_verification", "challenge": "abc"}))
                .unwrap();
        assert_eq!(
            h.controller.handle(&envelope).await,
            AckResult::Challenge("abc".to_string())
        );
        assert!(h.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn mention_dispatches_body_after_cooldown() {
        let mut h = harness(Duration::ZERO);
        assert_eq!(h.send(mention("1000.1", "<@U_BOT> greet hello")).await, AckResult::Ok);
        assert_eq!(
            h.chat.calls(),
            vec![ChatCall::Reaction {
                channel: "C1".to_string(),
                message_id: "1000.1".to_string(),
                reaction: "thumbsup".to_string(),
            }]
        );

        let runs = h.advance(Duration::ZERO).await;
        assert_eq!(runs.len(), 1);
        let state = &runs[0];
        assert_eq!(state["request_text"], json!("hello"));
        assert_eq!(state["requester"], json!("U_USER"));
        assert_eq!(state["workflow_name"], json!("greet"));
        assert!(state.contains_key("run_id"));
        assert!(!state.contains_key("attachments"));
        assert!(h.chat.posts().contains(&PROCESSING_NOTICE.to_string()));
        assert!(h.controller.store().is_empty());
    }

    #[tokio::test]
    async fn edit_before_cooldown_replaces_text() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("2000.1", "<@U_BOT> greet original")).await;
        h.send(edit("2000.1", "updated text")).await;

        let runs = h.advance(Duration::from_secs(30)).await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["request_text"], json!("updated text"));
        // Edits are not acknowledged.
        assert_eq!(h.chat.reactions(), vec!["2000.1".to_string()]);
    }

    #[tokio::test]
    async fn edit_that_repeats_mention_drops_command_word() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("2000.1", "<@U_BOT> greet original")).await;
        h.send(edit("2000.1", "<@U_BOT> greet fixed typo")).await;
        let runs = h.advance(Duration::from_secs(30)).await;
        assert_eq!(runs[0]["request_text"], json!("fixed typo"));
    }

    #[tokio::test]
    async fn thread_reply_is_appended_and_acknowledged() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("3000.1", "<@U_BOT> greet hello")).await;
        h.send(reply("3000.2", "3000.1", "more info")).await;

        assert_eq!(
            h.chat.reactions(),
            vec!["3000.1".to_string(), "3000.2".to_string()]
        );
        let runs = h.advance(Duration::from_secs(30)).await;
        assert_eq!(runs[0]["request_text"], json!("hello\nmore info"));
    }

    #[tokio::test]
    async fn reply_resets_cooldown() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("3000.1", "<@U_BOT> greet hello")).await;
        assert!(h.advance(Duration::from_secs(25)).await.is_empty());
        h.send(reply("3000.2", "3000.1", "wait")).await;
        assert!(h.advance(Duration::from_secs(25)).await.is_empty());
        assert_eq!(h.advance(Duration::from_secs(5)).await.len(), 1);
    }

    #[tokio::test]
    async fn deleted_request_never_dispatches() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("4000.1", "<@U_BOT> greet hello")).await;
        h.send(delete("4000.1")).await;

        // Delete is terminal: later mutations are orphans.
        h.send(edit("4000.1", "resurrect")).await;
        h.send(reply("4000.2", "4000.1", "hello?")).await;

        assert!(h.advance(Duration::from_secs(120)).await.is_empty());
        assert!(h.chat.posts().is_empty());
        assert_eq!(h.chat.reactions(), vec!["4000.1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_workflow_gets_one_notice() {
        let mut h = harness(Duration::ZERO);
        h.send(mention("5000.1", "<@U_BOT> deploy now")).await;
        let runs = h.advance(Duration::ZERO).await;

        assert!(runs.is_empty());
        assert_eq!(
            h.chat.posts(),
            vec![
                PROCESSING_NOTICE.to_string(),
                unknown_workflow_notice("deploy"),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_mention_is_acknowledged_once() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("6000.1", "<@U_BOT> greet hello")).await;
        h.send(mention("6000.1", "<@U_BOT> greet hello")).await;
        assert_eq!(h.chat.reactions().len(), 1);
        assert_eq!(h.advance(Duration::from_secs(30)).await.len(), 1);
    }

    #[tokio::test]
    async fn orphan_reply_produces_no_output() {
        let mut h = harness(Duration::ZERO);
        h.send(reply("7000.2", "7000.1", "anyone?")).await;
        assert!(h.advance(Duration::from_secs(60)).await.is_empty());
        assert!(h.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn own_messages_are_ignored() {
        let mut h = harness(Duration::ZERO);
        let mut event = mention("8000.1", "<@U_BOT> greet loop");
        event["bot_id"] = json!("B_SELF");
        h.send(event).await;
        assert!(h.controller.store().is_empty());
        assert!(h.advance(Duration::ZERO).await.is_empty());
    }

    #[tokio::test]
    async fn chat_failures_do_not_affect_store() {
        let mut h = harness_with(RecordingChat::failing(), Duration::from_secs(30));
        h.send(mention("9000.1", "<@U_BOT> greet hello")).await;
        assert!(h.controller.store().contains(&CoalescingKey::new("C1", "9000.1")));
        assert_eq!(h.advance(Duration::from_secs(30)).await.len(), 1);
    }

    #[tokio::test]
    async fn dispatcher_loop_runs_fired_requests() {
        let h = harness(Duration::from_secs(1));
        let Harness {
            controller,
            fired,
            chat,
            mut runs,
        } = h;
        let controller = Arc::new(controller);
        let shutdown = CancellationToken::new();
        let dispatcher = tokio::spawn(Arc::clone(&controller).run_dispatcher(fired, shutdown.clone()));

        let envelope: EventEnvelope = serde_json::from_value(json!({
            "type": "event_callback",
            "event": mention("1.0", "<@U_BOT> greet via loop"),
        }))
        .unwrap();
        controller.handle(&envelope).await;
        controller.store().scheduler().advance(Duration::from_secs(1));

        let state = tokio::time::timeout(Duration::from_secs(5), runs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["request_text"], json!("via loop"));
        assert!(chat.posts().contains(&PROCESSING_NOTICE.to_string()));

        shutdown.cancel();
        dispatcher.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_discards_pending_requests() {
        let h = harness(Duration::from_secs(30));
        h.send(mention("1.0", "<@U_BOT> greet later")).await;
        let Harness { controller, fired, .. } = h;
        let controller = Arc::new(controller);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        Arc::clone(&controller).run_dispatcher(fired, shutdown).await;
        assert!(controller.store().is_empty());
        assert_eq!(controller.store().scheduler().pending(), 0);
    }

    /// Chat whose reactions block until the test opens the gate.
    #[derive(Default)]
    struct GatedChat {
        gate: tokio::sync::Notify,
        reacted: std::sync::atomic::AtomicUsize,
    }

    impl ChatApi for GatedChat {
        async fn add_reaction(
            &self,
            _channel: &str,
            _message_id: &str,
            _reaction: &str,
        ) -> Result<(), lull_types::error::ChatError> {
            self.gate.notified().await;
            self.reacted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        async fn post_in_thread(
            &self,
            _channel: &str,
            _thread_id: &str,
            _text: &str,
        ) -> Result<(), lull_types::error::ChatError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn handle_returns_before_reaction_completes() {
        let chat = Arc::new(GatedChat::default());
        let settings = DebounceSettings {
            bot_user_id: BOT.to_string(),
            cooldown: Duration::from_secs(30),
            ack_reaction: "thumbsup".to_string(),
        };
        let (controller, _fired) = DebounceController::new(
            settings,
            Arc::clone(&chat),
            Arc::new(WorkflowEngine::new(WorkflowRegistry::new())),
            ManualScheduler::new(),
        );
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "type": "event_callback",
            "event": mention("1.0", "<@U_BOT> greet hi"),
        }))
        .unwrap();

        let ack = tokio::time::timeout(Duration::from_secs(1), controller.handle(&envelope))
            .await
            .expect("handle waited on the chat platform");
        assert_eq!(ack, AckResult::Ok);
        assert!(controller.store().contains(&CoalescingKey::new("C1", "1.0")));
        assert_eq!(chat.reacted.load(std::sync::atomic::Ordering::SeqCst), 0);

        chat.gate.notify_one();
        tokio::time::timeout(Duration::from_secs(1), async {
            while chat.reacted.load(std::sync::atomic::Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn reply_mentioning_bot_is_appended_verbatim() {
        let mut h = harness(Duration::from_secs(30));
        h.send(mention("3000.1", "<@U_BOT> greet hello")).await;
        h.send(reply("3000.2", "3000.1", "<@U_BOT> more info")).await;
        let runs = h.advance(Duration::from_secs(30)).await;
        assert_eq!(runs[0]["request_text"], json!("hello\n<@U_BOT> more info"));
    }
}
