//! Event classifier: decides what an inbound event means for the pending store.
//!
//! Classification is a single ordered decision list. The order matters:
//!
//! 1. Self-filter (`bot_id` present) -> `Ignore`
//! 2. Thread reply (`thread_ts` present and != `ts`) -> `ThreadReply`
//! 3. `message_changed` -> `Edit`
//! 4. `message_deleted` -> `Delete`
//! 5. Leading mention marker on `app_mention` / `message` -> `NewRequest`
//! 6. Anything else -> `Ignore`
//!
//! Replies are checked before mentions so that a reply which re-mentions the
//! bot still coalesces into its parent instead of opening a second request.

use lull_types::event::{MessageEvent, Subtype};
use lull_types::request::{CoalescingKey, Decision, NewRequest};

/// Event types that can open a new request.
const REQUEST_EVENT_TYPES: &[&str] = &["app_mention", "message"];

/// Pure event classifier bound to the bot's mention marker.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// `<@BOT_ID>`; `None` disables mention detection entirely.
    marker: Option<String>,
}

impl Classifier {
    /// Build a classifier for the given bot user id. An empty id means no
    /// message can ever count as a mention.
    pub fn new(bot_user_id: &str) -> Self {
        let marker = (!bot_user_id.is_empty()).then(|| format!("<@{bot_user_id}>"));
        Self { marker }
    }

    /// Classify one event. Reads the event only; no side effects.
    pub fn classify(&self, event: &MessageEvent) -> Decision {
        if event.bot_id.as_deref().is_some_and(|id| !id.is_empty()) {
            return Decision::Ignore;
        }

        let Some(channel) = non_empty(event.channel.as_deref()) else {
            return Decision::Ignore;
        };
        let text = event.text.as_deref().unwrap_or_default();

        if let Some(parent) = non_empty(event.thread_ts.as_deref()) {
            let own = non_empty(event.ts.as_deref());
            if own != Some(parent) {
                // A reply without its own id cannot be acknowledged or told
                // apart from its parent.
                let Some(reply_id) = own else {
                    return Decision::Ignore;
                };
                return Decision::ThreadReply {
                    parent_key: CoalescingKey::new(channel, parent),
                    reply_id: reply_id.to_string(),
                    appended_text: text.to_string(),
                    appended_attachments: event.files.clone().unwrap_or_default(),
                };
            }
        }

        match event.subtype_kind() {
            Subtype::MessageChanged => {
                let Some(nested) = event.message.as_ref() else {
                    return Decision::Ignore;
                };
                let Some(anchor) = non_empty(nested.ts.as_deref()) else {
                    return Decision::Ignore;
                };
                let new_text = nested.text.as_deref().unwrap_or_default();
                return Decision::Edit {
                    key: CoalescingKey::new(channel, anchor),
                    new_text: self.edited_body(new_text),
                    new_attachments: nested.files.clone(),
                };
            }
            Subtype::MessageDeleted => {
                return match non_empty(event.deleted_ts.as_deref()) {
                    Some(anchor) => Decision::Delete {
                        key: CoalescingKey::new(channel, anchor),
                    },
                    None => Decision::Ignore,
                };
            }
            Subtype::None | Subtype::FileShare => {}
            Subtype::Other(_) => return Decision::Ignore,
        }

        let kind = event.kind.as_deref().unwrap_or_default();
        if !REQUEST_EVENT_TYPES.contains(&kind) {
            return Decision::Ignore;
        }
        let Some(ts) = non_empty(event.ts.as_deref()) else {
            return Decision::Ignore;
        };
        let Some(stripped) = self.strip_mention(text) else {
            return Decision::Ignore;
        };

        let (workflow, body) = split_command(stripped);
        Decision::NewRequest(NewRequest {
            key: CoalescingKey::new(channel, ts),
            requester: event.user.clone().unwrap_or_default(),
            text: body.to_string(),
            attachments: event.files.clone().unwrap_or_default(),
            target_workflow: workflow.to_string(),
        })
    }

    /// Remove one leading mention marker and the whitespace after it.
    ///
    /// Returns `None` when the text does not start with the marker (leading
    /// whitespace is tolerated). The remainder is returned untouched.
    pub fn strip_mention<'a>(&self, text: &'a str) -> Option<&'a str> {
        let marker = self.marker.as_deref()?;
        text.trim_start()
            .strip_prefix(marker)
            .map(str::trim_start)
    }

    /// Body of an edited message. A re-mentioned edit repeats the command
    /// word, which is dropped; plain edits are taken verbatim.
    fn edited_body(&self, text: &str) -> String {
        match self.strip_mention(text) {
            Some(stripped) => split_command(stripped).1.to_string(),
            None => text.to_string(),
        }
    }
}

/// Split mention-stripped text into `(workflow, body)`.
///
/// The workflow is the first whitespace-delimited token (empty if there is
/// none); the body is everything after it with leading whitespace removed.
pub fn split_command(stripped: &str) -> (&str, &str) {
    let stripped = stripped.trim_start();
    match stripped.find(char::is_whitespace) {
        Some(end) => (&stripped[..end], stripped[end..].trim_start()),
        None => (stripped, ""),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
