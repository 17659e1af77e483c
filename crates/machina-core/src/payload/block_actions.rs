//! The block-actions payload.

use serde::Deserialize;
use serde_json::Value;

use super::common::{Channel, Enterprise, Team, User};
use super::element::{Action, StateValue};
use super::view::{State, View};
use crate::error::InvariantViolation;

/// Where the triggering element lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Container {
    Message {
        message_ts: String,
        channel_id: String,
        #[serde(default)]
        is_ephemeral: bool,
        #[serde(default)]
        thread_ts: Option<String>,
    },
    MessageAttachment {
        message_ts: String,
        channel_id: String,
        #[serde(default)]
        attachment_id: Option<u64>,
        #[serde(default)]
        is_ephemeral: bool,
        #[serde(default)]
        is_app_unfurl: bool,
    },
    View {
        view_id: String,
    },
}

impl Container {
    /// The wire `type` strings accepted for a container.
    pub const TYPES: [&'static str; 3] = ["message", "message_attachment", "view"];
}

/// The message an interactive element was posted in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractiveMessage {
    pub ts: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Value>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

/// Sent when a user interacts with a block element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockActionsPayload {
    pub user: User,
    pub container: Container,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub api_app_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub enterprise: Option<Enterprise>,
    #[serde(default)]
    pub is_enterprise_install: bool,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub message: Option<InteractiveMessage>,
    #[serde(default)]
    pub view: Option<View>,
    #[serde(default)]
    pub state: Option<State>,
    #[serde(default)]
    pub response_url: Option<String>,
}

impl BlockActionsPayload {
    /// Checks the cross-field rules once every field has decoded.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.actions.is_empty() {
            return Err(InvariantViolation::NoActions);
        }
        if self.message.is_none() && self.view.is_none() {
            return Err(InvariantViolation::MissingViewAndMessage);
        }
        if self.message.is_some() {
            if self.channel.is_none() {
                return Err(InvariantViolation::MessageWithout { field: "channel" });
            }
            if self.state.is_none() {
                return Err(InvariantViolation::MessageWithout { field: "state" });
            }
            if self.response_url.is_none() {
                return Err(InvariantViolation::MessageWithout {
                    field: "response_url",
                });
            }
        }
        Ok(())
    }

    /// Looks up an input value, first in the message state, then in the view state.
    pub fn state_value(&self, block_id: &str, action_id: &str) -> Option<&StateValue> {
        self.state
            .as_ref()
            .and_then(|state| state.get(block_id, action_id))
            .or_else(|| {
                self.view
                    .as_ref()
                    .and_then(|view| view.state.get(block_id, action_id))
            })
    }

    /// Channel id of the interaction, from the channel object or the container.
    pub fn channel_id(&self) -> Option<&str> {
        if let Some(channel) = &self.channel {
            return Some(&channel.id);
        }
        match &self.container {
            Container::Message { channel_id, .. }
            | Container::MessageAttachment { channel_id, .. } => Some(channel_id),
            Container::View { .. } => None,
        }
    }
}
