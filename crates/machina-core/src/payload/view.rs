//! Views (modals, home tabs) and the view lifecycle payloads.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::common::{Enterprise, Team, Text, User};
use super::element::StateValue;

/// Input state of a surface: `block_id -> action_id -> value`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct State {
    #[serde(default)]
    pub values: BTreeMap<String, BTreeMap<String, StateValue>>,
}

impl State {
    /// Looks up the value of one input element.
    pub fn get(&self, block_id: &str, action_id: &str) -> Option<&StateValue> {
        self.values.get(block_id)?.get(action_id)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Modal,
    Home,
    WorkflowStep,
    #[serde(other)]
    Unknown,
}

/// A platform-hosted surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct View {
    pub id: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub private_metadata: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Value>,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub title: Option<Text>,
    #[serde(default)]
    pub submit: Option<Text>,
    #[serde(default)]
    pub close: Option<Text>,
    #[serde(default)]
    pub root_view_id: Option<String>,
    #[serde(default)]
    pub previous_view_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// A response URL generated for a conversation-select input in a modal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseUrl {
    pub block_id: String,
    pub action_id: String,
    pub channel_id: String,
    pub response_url: String,
}

/// Sent when the user submits a modal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewSubmissionPayload {
    pub user: User,
    pub view: View,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub enterprise: Option<Enterprise>,
    #[serde(default)]
    pub api_app_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub is_enterprise_install: bool,
    #[serde(default)]
    pub response_urls: Vec<ResponseUrl>,
}

/// Sent when the user dismisses a modal that asked to be notified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewClosedPayload {
    pub user: User,
    pub view: View,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub enterprise: Option<Enterprise>,
    #[serde(default)]
    pub api_app_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub is_enterprise_install: bool,
    /// Whether the whole view stack was cleared rather than a single view closed.
    #[serde(default)]
    pub is_cleared: bool,
}
