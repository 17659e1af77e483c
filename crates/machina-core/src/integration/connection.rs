//! The inbound side of the transport.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::TransportResult;
use crate::event::SocketModeRequest;

/// The body of an acknowledgement.
///
/// A string becomes `{"text": ...}`; any other JSON value is sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct AckPayload(Value);

impl AckPayload {
    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for AckPayload {
    fn from(text: &str) -> Self {
        Self(json!({ "text": text }))
    }
}

impl From<String> for AckPayload {
    fn from(text: String) -> Self {
        Self(json!({ "text": text }))
    }
}

impl From<Value> for AckPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::from(text),
            other => Self(other),
        }
    }
}

/// The acknowledgement of one envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub envelope_id: String,
    pub payload: Option<AckPayload>,
}

impl Acknowledgement {
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<AckPayload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// The frame sent back over the socket.
    pub fn to_json(&self) -> Value {
        match &self.payload {
            Some(payload) => json!({
                "envelope_id": self.envelope_id,
                "payload": payload.as_value(),
            }),
            None => json!({ "envelope_id": self.envelope_id }),
        }
    }
}

/// A live socket connection able to acknowledge envelopes.
///
/// Implemented by the transport; the core sends exactly one acknowledgement
/// per request through it.
#[async_trait]
pub trait SocketConnection: Send + Sync {
    async fn acknowledge(&self, ack: Acknowledgement) -> TransportResult<()>;
}

/// A request paired with the connection it arrived on.
#[derive(Clone)]
pub struct InboundRequest {
    pub connection: Arc<dyn SocketConnection>,
    pub request: SocketModeRequest,
}

impl InboundRequest {
    pub fn new(connection: Arc<dyn SocketConnection>, request: SocketModeRequest) -> Self {
        Self {
            connection,
            request,
        }
    }
}

impl fmt::Debug for InboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundRequest")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_payload_becomes_text_object() {
        let ack = Acknowledgement::new("e1").with_payload("working on it");
        assert_eq!(
            ack.to_json(),
            json!({ "envelope_id": "e1", "payload": { "text": "working on it" } })
        );
    }

    #[test]
    fn test_json_string_payload_becomes_text_object() {
        let payload = AckPayload::from(json!("hi"));
        assert_eq!(payload.into_value(), json!({ "text": "hi" }));
    }

    #[test]
    fn test_object_payload_is_sent_as_is() {
        let ack = Acknowledgement::new("e2").with_payload(json!({ "response_action": "clear" }));
        assert_eq!(
            ack.to_json(),
            json!({ "envelope_id": "e2", "payload": { "response_action": "clear" } })
        );
    }

    #[test]
    fn test_empty_ack() {
        assert_eq!(
            Acknowledgement::new("e3").to_json(),
            json!({ "envelope_id": "e3" })
        );
    }
}
