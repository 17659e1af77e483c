//! Inbound requests and the events they carry.
//!
//! The transport hands the core one [`SocketModeRequest`] per envelope. Its
//! `payload` is interpreted according to [`RequestType`]:
//!
//! - `events_api`: an event callback whose `event` is a raw event object,
//!   possibly a [`MessageEvent`]
//! - `slash_commands`: a [`SlashCommand`]
//! - `interactive`: an interactive payload, see [`crate::payload`]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subtype carried by edit notifications.
pub const MESSAGE_CHANGED: &str = "message_changed";

/// Event type of message events.
pub const MESSAGE_EVENT: &str = "message";

// =============================================================================
// Envelope
// =============================================================================

/// Kind of an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    EventsApi,
    Interactive,
    SlashCommands,
    /// Any other envelope type (`hello`, `disconnect`, ...).
    #[serde(other)]
    Unknown,
}

impl RequestType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventsApi => "events_api",
            Self::Interactive => "interactive",
            Self::SlashCommands => "slash_commands",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound request received over the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SocketModeRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default)]
    pub envelope_id: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub accepts_response_payload: bool,
    #[serde(default)]
    pub retry_attempt: Option<u32>,
    #[serde(default)]
    pub retry_reason: Option<String>,
}

impl SocketModeRequest {
    pub fn new(request_type: RequestType, envelope_id: impl Into<String>, payload: Value) -> Self {
        Self {
            request_type,
            envelope_id: envelope_id.into(),
            payload,
            accepts_response_payload: false,
            retry_attempt: None,
            retry_reason: None,
        }
    }

    /// Parses a raw socket frame.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// The event object of an `events_api` envelope.
    ///
    /// Event callbacks nest the event under `event`; a payload without that
    /// field is taken to be the event itself.
    pub fn event(&self) -> &Value {
        self.payload.get("event").unwrap_or(&self.payload)
    }
}

/// The `type` of a raw event object.
pub fn event_type(event: &Value) -> Option<&str> {
    event.get("type").and_then(Value::as_str)
}

// =============================================================================
// Message Events
// =============================================================================

/// Type of the conversation a message was posted in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Channel,
    Group,
    Im,
    Mpim,
    AppHome,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ChannelType {
    /// Public and private channels only address the bot through a mention.
    pub fn requires_mention(self) -> bool {
        matches!(self, Self::Channel | Self::Group)
    }
}

/// A `message` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    /// The edited message, for `message_changed` notifications.
    #[serde(default)]
    pub message: Option<Box<MessageEvent>>,
    #[serde(default)]
    pub blocks: Vec<Value>,
}

impl MessageEvent {
    pub fn from_value(event: &Value) -> serde_json::Result<Self> {
        Self::deserialize(event)
    }

    pub fn is_edit(&self) -> bool {
        self.subtype.as_deref() == Some(MESSAGE_CHANGED)
    }

    /// Replaces an edit notification by the edited message.
    ///
    /// The inner message inherits the outer `channel` and `channel_type` and is
    /// marked with the `message_changed` subtype. Other events are returned
    /// unchanged.
    pub fn normalize_edit(self) -> Self {
        if !self.is_edit() {
            return self;
        }
        let Some(inner) = self.message else {
            return Self {
                message: None,
                ..self
            };
        };
        Self {
            channel: self.channel,
            channel_type: self.channel_type,
            subtype: Some(MESSAGE_CHANGED.to_owned()),
            ..*inner
        }
    }

    /// Timestamp of the thread this message belongs to, or starts.
    pub fn thread_root(&self) -> Option<&str> {
        self.thread_ts.as_deref().or(self.ts.as_deref())
    }

    pub fn is_in_thread(&self) -> bool {
        self.thread_ts.is_some()
    }
}

// =============================================================================
// Slash Commands
// =============================================================================

/// A slash-command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlashCommand {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub trigger_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub api_app_id: Option<String>,
}

impl SlashCommand {
    pub fn from_value(payload: &Value) -> serde_json::Result<Self> {
        Self::deserialize(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let request = SocketModeRequest::from_json(
            r#"{"type":"events_api","envelope_id":"e1","payload":{"event":{"type":"app_mention"}}}"#,
        )
        .unwrap();
        assert_eq!(request.request_type, RequestType::EventsApi);
        assert_eq!(event_type(request.event()), Some("app_mention"));
    }

    #[test]
    fn test_unknown_envelope_type() {
        let request = SocketModeRequest::from_json(r#"{"type":"hello"}"#).unwrap();
        assert_eq!(request.request_type, RequestType::Unknown);
    }

    #[test]
    fn test_channel_type_defaults_to_unknown() {
        let event = MessageEvent::from_value(&json!({ "type": "message", "text": "hi" })).unwrap();
        assert_eq!(event.channel_type, ChannelType::Unknown);
        assert!(!event.channel_type.requires_mention());
        assert!(ChannelType::Group.requires_mention());
    }

    #[test]
    fn test_normalize_edit_inherits_channel() {
        let event = MessageEvent::from_value(&json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C1",
            "channel_type": "channel",
            "message": { "type": "message", "text": "edited", "user": "U1", "ts": "2.0" }
        }))
        .unwrap()
        .normalize_edit();

        assert_eq!(event.text, "edited");
        assert_eq!(event.user.as_deref(), Some("U1"));
        assert_eq!(event.channel.as_deref(), Some("C1"));
        assert_eq!(event.channel_type, ChannelType::Channel);
        assert!(event.is_edit());
    }

    #[test]
    fn test_normalize_plain_message_is_identity() {
        let event = MessageEvent::from_value(&json!({ "text": "hi", "user": "U1" })).unwrap();
        assert_eq!(event.clone().normalize_edit(), event);
    }

    #[test]
    fn test_thread_root_prefers_thread_ts() {
        let event =
            MessageEvent::from_value(&json!({ "text": "hi", "ts": "2.0", "thread_ts": "1.0" }))
                .unwrap();
        assert_eq!(event.thread_root(), Some("1.0"));
    }
}
