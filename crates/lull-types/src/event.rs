//! Inbound chat-platform event envelope.
//!
//! Mirrors the subset of the Slack Events API payload that the debounce
//! pipeline reads. Every field is optional and deserialized leniently: a field
//! with an unexpected JSON type becomes `None` instead of failing the whole
//! envelope, so irrelevant event shapes (e.g. `channel_created`, whose
//! `channel` is an object) fall through to the classifier and get ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level `type` of a URL verification handshake.
pub const URL_VERIFICATION: &str = "url_verification";

/// Top-level `type` of a regular event delivery.
pub const EVENT_CALLBACK: &str = "event_callback";

/// Outer envelope delivered to the events endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Envelope type (`url_verification`, `event_callback`, ...).
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    /// Handshake token, present only on `url_verification`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub challenge: Option<String>,
    /// The wrapped event, present on `event_callback`.
    #[serde(default)]
    pub event: Option<MessageEvent>,
}

impl EventEnvelope {
    /// Whether this envelope is a URL verification handshake.
    pub fn is_url_verification(&self) -> bool {
        self.kind.as_deref() == Some(URL_VERIFICATION)
    }
}

/// The inner `event` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Event type (`app_mention`, `message`, ...).
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    /// Message subtype (`message_changed`, `message_deleted`, `file_share`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub subtype: Option<String>,
    /// Conversation the event happened in.
    #[serde(default, deserialize_with = "lenient_string")]
    pub channel: Option<String>,
    /// Identifier of this message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub ts: Option<String>,
    /// Identifier of the thread parent, present only on replies.
    #[serde(default, deserialize_with = "lenient_string")]
    pub thread_ts: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    /// Author user id.
    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,
    /// Present when a bot (including this one) authored the message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub bot_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_files")]
    pub files: Option<Vec<Attachment>>,
    /// New message body on `message_changed`.
    #[serde(default)]
    pub message: Option<EditedMessage>,
    /// Identifier of the removed message on `message_deleted`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub deleted_ts: Option<String>,
}

impl MessageEvent {
    /// Parsed view of the `subtype` field.
    pub fn subtype_kind(&self) -> Subtype {
        Subtype::parse(self.subtype.as_deref())
    }
}

/// Nested message body carried by an edit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditedMessage {
    /// Identifier of the message that was edited.
    #[serde(default, deserialize_with = "lenient_string")]
    pub ts: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "lenient_files")]
    pub files: Option<Vec<Attachment>>,
}

/// Message subtype as far as classification cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subtype {
    /// Plain message, no subtype.
    None,
    /// Content of an earlier message was modified.
    MessageChanged,
    /// An earlier message was removed.
    MessageDeleted,
    /// Message carrying uploaded files.
    FileShare,
    /// Any other subtype (joins, topic changes, bot messages, ...).
    Other(String),
}

impl Subtype {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Subtype::None,
            Some("message_changed") => Subtype::MessageChanged,
            Some("message_deleted") => Subtype::MessageDeleted,
            Some("file_share") => Subtype::FileShare,
            Some(other) => Subtype::Other(other.to_string()),
        }
    }
}

/// Opaque attachment descriptor, passed through to workflows untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachment(pub Value);

impl Attachment {
    /// Platform file id, if the descriptor carries one.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Lenient field deserializers
// ---------------------------------------------------------------------------

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_files<'de, D>(deserializer: D) -> Result<Option<Vec<Attachment>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items.into_iter().map(Attachment).collect()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_verification_envelope() {
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "type": "url_verification",
            "challenge": "abc123",
        }))
        .unwrap();
        assert!(envelope.is_url_verification());
        assert_eq!(envelope.challenge.as_deref(), Some("abc123"));
        assert!(envelope.event.is_none());
    }

    #[test]
    fn test_mention_event_fields() {
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "text": "<@U_BOT> greet hello",
                "ts": "1000.1",
                "channel": "C1",
                "user": "U_USER",
                "files": [{"id": "F1", "name": "notes.txt"}],
            },
        }))
        .unwrap();
        let event = envelope.event.unwrap();
        assert_eq!(event.kind.as_deref(), Some("app_mention"));
        assert_eq!(event.channel.as_deref(), Some("C1"));
        assert_eq!(event.subtype_kind(), Subtype::None);
        let files = event.files.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id(), Some("F1"));
        assert_eq!(files[0].name(), Some("notes.txt"));
    }

    #[test]
    fn test_edit_event_nested_message() {
        let event: MessageEvent = serde_json::from_value(json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C1",
            "ts": "wrapper.1",
            "message": {"text": "fixed", "ts": "edit.1"},
        }))
        .unwrap();
        assert_eq!(event.subtype_kind(), Subtype::MessageChanged);
        let nested = event.message.unwrap();
        assert_eq!(nested.ts.as_deref(), Some("edit.1"));
        assert_eq!(nested.text.as_deref(), Some("fixed"));
        assert!(nested.files.is_none());
    }

    #[test]
    fn test_object_valued_channel_is_dropped() {
        let envelope: EventEnvelope = serde_json::from_value(json!({
            "type": "event_callback",
            "event": {"type": "channel_created", "channel": {"id": "C2"}},
        }))
        .unwrap();
        let event = envelope.event.unwrap();
        assert_eq!(event.kind.as_deref(), Some("channel_created"));
        assert!(event.channel.is_none());
    }

    #[test]
    fn test_non_array_files_ignored() {
        let event: MessageEvent =
            serde_json::from_value(json!({"files": "nope", "text": "hi"})).unwrap();
        assert!(event.files.is_none());
        assert_eq!(event.text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_subtype_parse() {
        assert_eq!(Subtype::parse(Some("message_deleted")), Subtype::MessageDeleted);
        assert_eq!(Subtype::parse(Some("file_share")), Subtype::FileShare);
        assert_eq!(
            Subtype::parse(Some("channel_join")),
            Subtype::Other("channel_join".to_string())
        );
    }
}
