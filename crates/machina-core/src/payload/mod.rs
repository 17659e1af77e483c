//! Typed model of interactive payloads.
//!
//! Interactive payloads arrive as untyped JSON claiming one of three shapes:
//! block actions, view submissions and view closures. [`decode_interactive`]
//! turns such a value into an [`InteractivePayload`] or a [`DecodeError`].
//!
//! # Decoding stages
//!
//! 1. The input must be an object whose `type` names a known payload type.
//! 2. Every union point nested inside (each action, each state value, the
//!    container) is checked against its closed set of discriminants, so an
//!    unsupported element is reported by name and location instead of as a
//!    generic field error.
//! 3. Fields are decoded by serde.
//! 4. Cross-field invariants run last, as a single step.
//!
//! Decoding is pure and total: it never panics.
//!
//! ```rust,ignore
//! let payload = decode_interactive(&value)?;
//! if let InteractivePayload::BlockActions(actions) = payload {
//!     for action in &actions.actions {
//!         println!("{} ({})", action.action_id, action.kind());
//!     }
//! }
//! ```

mod block_actions;
mod common;
mod element;
mod view;

pub use block_actions::{BlockActionsPayload, Container, InteractiveMessage};
pub use common::{Channel, Enterprise, SelectOption, Team, Text, User};
pub use element::{Action, ActionElement, ElementKind, StateValue};
pub use view::{ResponseUrl, State, View, ViewClosedPayload, ViewSubmissionPayload, ViewType};

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{DecodeError, DecodeResult};

/// The closed set of interactive payload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    BlockActions,
    ViewSubmission,
    ViewClosed,
}

impl PayloadType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockActions => "block_actions",
            Self::ViewSubmission => "view_submission",
            Self::ViewClosed => "view_closed",
        }
    }

    pub fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            "block_actions" => Some(Self::BlockActions),
            "view_submission" => Some(Self::ViewSubmission),
            "view_closed" => Some(Self::ViewClosed),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded interactive payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractivePayload {
    BlockActions(Box<BlockActionsPayload>),
    ViewSubmission(Box<ViewSubmissionPayload>),
    ViewClosed(Box<ViewClosedPayload>),
}

impl InteractivePayload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::BlockActions(_) => PayloadType::BlockActions,
            Self::ViewSubmission(_) => PayloadType::ViewSubmission,
            Self::ViewClosed(_) => PayloadType::ViewClosed,
        }
    }

    /// The user who triggered the interaction.
    pub fn user(&self) -> &User {
        match self {
            Self::BlockActions(p) => &p.user,
            Self::ViewSubmission(p) => &p.user,
            Self::ViewClosed(p) => &p.user,
        }
    }

    /// The view involved, if any.
    pub fn view(&self) -> Option<&View> {
        match self {
            Self::BlockActions(p) => p.view.as_ref(),
            Self::ViewSubmission(p) => Some(&p.view),
            Self::ViewClosed(p) => Some(&p.view),
        }
    }
}

/// Decodes an untyped value into an [`InteractivePayload`].
pub fn decode_interactive(value: &Value) -> DecodeResult<InteractivePayload> {
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let type_name = discriminant(value, "$")?;
    let payload_type = PayloadType::from_type(type_name)
        .ok_or_else(|| DecodeError::UnrecognizedPayloadType(type_name.to_owned()))?;

    check_elements(object)?;

    match payload_type {
        PayloadType::BlockActions => {
            check_container(object)?;
            let payload = BlockActionsPayload::deserialize(value)?;
            payload.validate()?;
            Ok(InteractivePayload::BlockActions(Box::new(payload)))
        }
        PayloadType::ViewSubmission => Ok(InteractivePayload::ViewSubmission(Box::new(
            ViewSubmissionPayload::deserialize(value)?,
        ))),
        PayloadType::ViewClosed => Ok(InteractivePayload::ViewClosed(Box::new(
            ViewClosedPayload::deserialize(value)?,
        ))),
    }
}

/// Parses and decodes a JSON string.
pub fn decode_interactive_str(raw: &str) -> DecodeResult<InteractivePayload> {
    let value: Value = serde_json::from_str(raw)?;
    decode_interactive(&value)
}

fn discriminant<'a>(value: &'a Value, location: &str) -> DecodeResult<&'a str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::MissingDiscriminant {
            location: location.to_owned(),
        })
}

fn check_elements(object: &Map<String, Value>) -> DecodeResult<()> {
    if let Some(actions) = object.get("actions").and_then(Value::as_array) {
        for (index, action) in actions.iter().enumerate() {
            check_element(action, &format!("actions[{index}]"), true)?;
        }
    }
    if let Some(state) = object.get("state") {
        check_state(state, "state")?;
    }
    if let Some(state) = object.get("view").and_then(|view| view.get("state")) {
        check_state(state, "view.state")?;
    }
    Ok(())
}

fn check_state(state: &Value, prefix: &str) -> DecodeResult<()> {
    let Some(blocks) = state.get("values").and_then(Value::as_object) else {
        return Ok(());
    };
    for (block_id, inputs) in blocks {
        let Some(inputs) = inputs.as_object() else {
            continue;
        };
        for (action_id, input) in inputs {
            check_element(
                input,
                &format!("{prefix}.values.{block_id}.{action_id}"),
                false,
            )?;
        }
    }
    Ok(())
}

fn check_element(value: &Value, location: &str, is_action: bool) -> DecodeResult<()> {
    let type_name = discriminant(value, location)?;
    match ElementKind::from_type(type_name) {
        Some(kind) if is_action || !kind.is_action_only() => Ok(()),
        _ => Err(DecodeError::UnrecognizedElementType {
            element_type: type_name.to_owned(),
            location: location.to_owned(),
        }),
    }
}

fn check_container(object: &Map<String, Value>) -> DecodeResult<()> {
    let Some(container) = object.get("container") else {
        // serde reports the missing field
        return Ok(());
    };
    let type_name = discriminant(container, "container")?;
    if Container::TYPES.contains(&type_name) {
        Ok(())
    } else {
        Err(DecodeError::UnrecognizedContainerType(type_name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvariantViolation;
    use serde_json::json;

    fn button(action_id: &str, block_id: &str) -> Value {
        json!({
            "type": "button",
            "action_id": action_id,
            "block_id": block_id,
            "action_ts": "1700000000.000100",
            "text": { "type": "plain_text", "text": "Go" },
            "value": "go"
        })
    }

    fn view_json() -> Value {
        json!({
            "id": "V123",
            "type": "modal",
            "callback_id": "deploy_modal",
            "private_metadata": "",
            "state": {
                "values": {
                    "env_block": {
                        "env": {
                            "type": "static_select",
                            "selected_option": {
                                "text": { "type": "plain_text", "text": "Staging" },
                                "value": "staging"
                            }
                        }
                    }
                }
            }
        })
    }

    fn message_block_actions() -> Value {
        json!({
            "type": "block_actions",
            "user": { "id": "U1", "username": "alice" },
            "container": { "type": "message", "message_ts": "1.1", "channel_id": "C1" },
            "channel": { "id": "C1", "name": "general" },
            "message": { "ts": "1.1", "text": "hello" },
            "state": { "values": {} },
            "response_url": "https://hooks.example/r",
            "actions": [button("approve", "request_1")]
        })
    }

    #[test]
    fn test_decode_message_block_actions() {
        let payload = decode_interactive(&message_block_actions()).unwrap();
        assert_eq!(payload.payload_type(), PayloadType::BlockActions);
        assert_eq!(payload.user().id, "U1");
        let InteractivePayload::BlockActions(p) = payload else {
            panic!("expected block actions");
        };
        assert_eq!(p.actions[0].kind(), ElementKind::Button);
        assert_eq!(p.channel_id(), Some("C1"));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(
            decode_interactive(&json!([1, 2])),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn test_decode_missing_top_level_type() {
        let mut value = message_block_actions();
        value.as_object_mut().unwrap().remove("type");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::MissingDiscriminant { location }) if location == "$"
        ));
    }

    #[test]
    fn test_decode_unknown_payload_type() {
        let mut value = message_block_actions();
        value["type"] = json!("shortcut");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::UnrecognizedPayloadType(t)) if t == "shortcut"
        ));
    }

    #[test]
    fn test_decode_unknown_action_type() {
        let mut value = message_block_actions();
        value["actions"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "type": "slider", "action_id": "s", "block_id": "b" }));
        match decode_interactive(&value) {
            Err(DecodeError::UnrecognizedElementType {
                element_type,
                location,
            }) => {
                assert_eq!(element_type, "slider");
                assert_eq!(location, "actions[1]");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_decode_action_without_type() {
        let mut value = message_block_actions();
        value["actions"] = json!([{ "action_id": "a", "block_id": "b" }]);
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::MissingDiscriminant { location }) if location == "actions[0]"
        ));
    }

    #[test]
    fn test_decode_unknown_state_value_type() {
        let mut value = message_block_actions();
        value["state"] = json!({ "values": { "b": { "a": { "type": "color_picker" } } } });
        match decode_interactive(&value) {
            Err(DecodeError::UnrecognizedElementType { location, .. }) => {
                assert_eq!(location, "state.values.b.a");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_decode_button_is_not_a_state_value() {
        let mut value = message_block_actions();
        value["state"] = json!({ "values": { "b": { "a": { "type": "button" } } } });
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::UnrecognizedElementType { element_type, .. }) if element_type == "button"
        ));
    }

    #[test]
    fn test_decode_unknown_view_state_value_type() {
        let mut view = view_json();
        view["state"]["values"]["env_block"]["env"]["type"] = json!("mystery");
        let value = json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": view
        });
        match decode_interactive(&value) {
            Err(DecodeError::UnrecognizedElementType { location, .. }) => {
                assert_eq!(location, "view.state.values.env_block.env");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_container_type() {
        let mut value = message_block_actions();
        value["container"]["type"] = json!("canvas");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::UnrecognizedContainerType(t)) if t == "canvas"
        ));
    }

    #[test]
    fn test_invariant_requires_view_or_message() {
        let mut value = message_block_actions();
        value.as_object_mut().unwrap().remove("message");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::Invariant(
                InvariantViolation::MissingViewAndMessage
            ))
        ));
    }

    #[test]
    fn test_invariant_message_requires_state() {
        let mut value = message_block_actions();
        value.as_object_mut().unwrap().remove("state");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::Invariant(InvariantViolation::MessageWithout {
                field: "state"
            }))
        ));
    }

    #[test]
    fn test_invariant_message_requires_channel_and_response_url() {
        let mut value = message_block_actions();
        value.as_object_mut().unwrap().remove("response_url");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::Invariant(InvariantViolation::MessageWithout {
                field: "response_url"
            }))
        ));

        let mut value = message_block_actions();
        value.as_object_mut().unwrap().remove("channel");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::Invariant(InvariantViolation::MessageWithout {
                field: "channel"
            }))
        ));
    }

    #[test]
    fn test_invariant_requires_actions() {
        let mut value = message_block_actions();
        value["actions"] = json!([]);
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::Invariant(InvariantViolation::NoActions))
        ));
    }

    #[test]
    fn test_view_and_complete_message_decodes() {
        let mut value = message_block_actions();
        value["view"] = view_json();
        let payload = decode_interactive(&value).unwrap();
        let InteractivePayload::BlockActions(p) = payload else {
            panic!("expected block actions");
        };
        assert!(p.view.is_some());
        assert!(p.message.is_some());
        assert_eq!(
            p.state_value("env_block", "env").and_then(StateValue::value),
            Some("staging")
        );
    }

    #[test]
    fn test_view_only_block_actions_decodes() {
        let value = json!({
            "type": "block_actions",
            "user": { "id": "U1" },
            "container": { "type": "view", "view_id": "V123" },
            "view": view_json(),
            "actions": [button("refresh", "header")]
        });
        let payload = decode_interactive(&value).unwrap();
        assert_eq!(payload.view().map(|v| v.callback_id.as_str()), Some("deploy_modal"));
    }

    #[test]
    fn test_field_level_failure_is_malformed() {
        let mut value = message_block_actions();
        value["user"] = json!("U1");
        assert!(matches!(
            decode_interactive(&value),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_view_closed() {
        let payload = decode_interactive_str(
            &json!({
                "type": "view_closed",
                "user": { "id": "U9" },
                "view": view_json(),
                "is_cleared": true
            })
            .to_string(),
        )
        .unwrap();
        let InteractivePayload::ViewClosed(p) = payload else {
            panic!("expected view closed");
        };
        assert!(p.is_cleared);
        assert_eq!(p.view.view_type, ViewType::Modal);
    }

    #[test]
    fn test_decode_str_rejects_invalid_json() {
        assert!(matches!(
            decode_interactive_str("{not json"),
            Err(DecodeError::Malformed(_))
        ));
    }
}
