//! Pending request domain types.
//!
//! A `PendingRequest` accumulates the text and attachments of one logical
//! user request while its cooldown timer is armed. It is keyed by a
//! `CoalescingKey`: the conversation plus the id of the message that opened
//! the request.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::event::Attachment;

// ---------------------------------------------------------------------------
// CoalescingKey
// ---------------------------------------------------------------------------

/// Identifier grouping every event that belongs to one logical request.
///
/// `anchor_id` is always the id of the originating message, never the id of
/// a later edit wrapper or thread reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoalescingKey {
    pub conversation_id: String,
    pub anchor_id: String,
}

impl CoalescingKey {
    pub fn new(conversation_id: impl Into<String>, anchor_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            anchor_id: anchor_id.into(),
        }
    }
}

impl fmt::Display for CoalescingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.anchor_id)
    }
}

// ---------------------------------------------------------------------------
// NewRequest
// ---------------------------------------------------------------------------

/// Fields extracted from a qualifying new-mention event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub key: CoalescingKey,
    /// Opaque id of the user who opened the request.
    pub requester: String,
    /// Request body: the mention-stripped text minus the workflow token.
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// First token after the mention marker; empty when the mention is bare.
    pub target_workflow: String,
}

// ---------------------------------------------------------------------------
// PendingRequest
// ---------------------------------------------------------------------------

/// A request waiting for its cooldown window to elapse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub key: CoalescingKey,
    pub requester: String,
    /// Accumulated text. Replaced on edit, newline-appended on thread reply.
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Fixed at creation; edits and replies never change it.
    pub target_workflow: String,
    pub created_at: DateTime<Utc>,
    /// When the current timer was armed.
    pub last_scheduled_at: DateTime<Utc>,
    /// When the current timer is due to fire.
    pub deadline: DateTime<Utc>,
}

impl PendingRequest {
    /// Build a fresh record from a new-mention event. Timestamps are set to
    /// `now`; the store stamps the real deadline when it arms the timer.
    pub fn from_new(request: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            key: request.key,
            requester: request.requester,
            text: request.text,
            attachments: request.attachments,
            target_workflow: request.target_workflow,
            created_at: now,
            last_scheduled_at: now,
            deadline: now,
        }
    }

    /// Apply an edit: text is replaced wholesale, attachments only when the
    /// edit supplied a list.
    pub fn apply_edit(&mut self, text: String, attachments: Option<Vec<Attachment>>) {
        self.text = text;
        if let Some(attachments) = attachments {
            self.attachments = attachments;
        }
    }

    /// Append a thread reply's text on a new line and extend attachments.
    pub fn append_reply(&mut self, text: &str, attachments: Vec<Attachment>) {
        self.text.push('\n');
        self.text.push_str(text);
        self.attachments.extend(attachments);
    }

    /// Initial workflow state handed to the engine on dispatch.
    ///
    /// Shape: `{ "request_text", "requester", "attachments"? }`. The
    /// attachments key is omitted when there are none.
    pub fn to_payload(&self) -> serde_json::Map<String, Value> {
        let mut payload = serde_json::Map::new();
        payload.insert("request_text".to_string(), json!(self.text));
        payload.insert("requester".to_string(), json!(self.requester));
        if !self.attachments.is_empty() {
            payload.insert("attachments".to_string(), json!(self.attachments));
        }
        payload
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of classifying one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Self-originated, malformed, or irrelevant.
    Ignore,
    /// A reply inside the thread of a (possibly) pending request.
    ThreadReply {
        parent_key: CoalescingKey,
        /// Id of the reply itself, used for acknowledgment.
        reply_id: String,
        appended_text: String,
        appended_attachments: Vec<Attachment>,
    },
    /// The originating message was edited.
    Edit {
        key: CoalescingKey,
        new_text: String,
        /// `None` when the edit carried no file list.
        new_attachments: Option<Vec<Attachment>>,
    },
    /// The originating message was deleted.
    Delete { key: CoalescingKey },
    /// A message addressed to the bot.
    NewRequest(NewRequest),
}

// ---------------------------------------------------------------------------
// AckResult
// ---------------------------------------------------------------------------

/// What the events endpoint answers the platform with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckResult {
    /// Regular delivery accepted.
    Ok,
    /// URL verification handshake; the token is echoed verbatim.
    Challenge(String),
}

impl AckResult {
    /// JSON body: `{"ok": true}` or `{"challenge": "..."}`.
    pub fn to_json(&self) -> Value {
        match self {
            AckResult::Ok => json!({ "ok": true }),
            AckResult::Challenge(token) => json!({ "challenge": token }),
        }
    }
}
