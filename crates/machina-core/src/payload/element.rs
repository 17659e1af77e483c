//! Interactive UI elements.
//!
//! Every triggered action and every state value is discriminated on its own
//! `type` field against a closed set of element kinds. [`ElementKind`] is that
//! set; [`ActionElement`] and [`StateValue`] carry exactly the fields
//! meaningful for each kind.

use std::fmt;

use chrono::serde::ts_seconds_option;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::common::{SelectOption, Text};

// =============================================================================
// Element Kind
// =============================================================================

/// The closed set of interactive element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Button,
    Checkboxes,
    Datepicker,
    Datetimepicker,
    Timepicker,
    StaticSelect,
    ExternalSelect,
    UsersSelect,
    ConversationsSelect,
    ChannelsSelect,
    MultiStaticSelect,
    MultiExternalSelect,
    MultiUsersSelect,
    MultiConversationsSelect,
    MultiChannelsSelect,
    RadioButtons,
    Overflow,
    PlainTextInput,
    RichTextInput,
    UrlTextInput,
    EmailTextInput,
    NumberInput,
}

impl ElementKind {
    /// Every element kind, in declaration order.
    pub const ALL: [ElementKind; 22] = [
        Self::Button,
        Self::Checkboxes,
        Self::Datepicker,
        Self::Datetimepicker,
        Self::Timepicker,
        Self::StaticSelect,
        Self::ExternalSelect,
        Self::UsersSelect,
        Self::ConversationsSelect,
        Self::ChannelsSelect,
        Self::MultiStaticSelect,
        Self::MultiExternalSelect,
        Self::MultiUsersSelect,
        Self::MultiConversationsSelect,
        Self::MultiChannelsSelect,
        Self::RadioButtons,
        Self::Overflow,
        Self::PlainTextInput,
        Self::RichTextInput,
        Self::UrlTextInput,
        Self::EmailTextInput,
        Self::NumberInput,
    ];

    /// The wire `type` string of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Checkboxes => "checkboxes",
            Self::Datepicker => "datepicker",
            Self::Datetimepicker => "datetimepicker",
            Self::Timepicker => "timepicker",
            Self::StaticSelect => "static_select",
            Self::ExternalSelect => "external_select",
            Self::UsersSelect => "users_select",
            Self::ConversationsSelect => "conversations_select",
            Self::ChannelsSelect => "channels_select",
            Self::MultiStaticSelect => "multi_static_select",
            Self::MultiExternalSelect => "multi_external_select",
            Self::MultiUsersSelect => "multi_users_select",
            Self::MultiConversationsSelect => "multi_conversations_select",
            Self::MultiChannelsSelect => "multi_channels_select",
            Self::RadioButtons => "radio_buttons",
            Self::Overflow => "overflow",
            Self::PlainTextInput => "plain_text_input",
            Self::RichTextInput => "rich_text_input",
            Self::UrlTextInput => "url_text_input",
            Self::EmailTextInput => "email_text_input",
            Self::NumberInput => "number_input",
        }
    }

    /// Looks up a kind by its wire `type` string.
    pub fn from_type(type_name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == type_name)
    }

    /// Kinds that only ever appear as triggered actions, never as state values.
    pub const fn is_action_only(self) -> bool {
        matches!(self, Self::Button | Self::Overflow)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Triggered Actions
// =============================================================================

/// One triggered action of a block-actions payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Action {
    pub action_id: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub action_ts: Option<String>,
    #[serde(flatten)]
    pub element: ActionElement,
}

impl Action {
    pub fn kind(&self) -> ElementKind {
        self.element.kind()
    }
}

/// The element-specific part of a triggered action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button {
        text: Text,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        style: Option<String>,
    },
    Checkboxes {
        #[serde(default)]
        selected_options: Vec<SelectOption>,
    },
    Datepicker {
        #[serde(default)]
        selected_date: Option<NaiveDate>,
    },
    Datetimepicker {
        #[serde(default, deserialize_with = "ts_seconds_option::deserialize")]
        selected_date_time: Option<DateTime<Utc>>,
    },
    Timepicker {
        #[serde(default, deserialize_with = "hhmm::deserialize")]
        selected_time: Option<NaiveTime>,
        #[serde(default)]
        timezone: Option<String>,
    },
    StaticSelect {
        #[serde(default)]
        selected_option: Option<SelectOption>,
    },
    ExternalSelect {
        #[serde(default)]
        selected_option: Option<SelectOption>,
    },
    UsersSelect {
        #[serde(default)]
        selected_user: Option<String>,
    },
    ConversationsSelect {
        #[serde(default)]
        selected_conversation: Option<String>,
    },
    ChannelsSelect {
        #[serde(default)]
        selected_channel: Option<String>,
    },
    MultiStaticSelect {
        #[serde(default)]
        selected_options: Vec<SelectOption>,
    },
    MultiExternalSelect {
        #[serde(default)]
        selected_options: Vec<SelectOption>,
    },
    MultiUsersSelect {
        #[serde(default)]
        selected_users: Vec<String>,
    },
    MultiConversationsSelect {
        #[serde(default)]
        selected_conversations: Vec<String>,
    },
    MultiChannelsSelect {
        #[serde(default)]
        selected_channels: Vec<String>,
    },
    RadioButtons {
        #[serde(default)]
        selected_option: Option<SelectOption>,
    },
    Overflow {
        selected_option: SelectOption,
    },
    PlainTextInput {
        #[serde(default)]
        value: Option<String>,
    },
    RichTextInput {
        #[serde(default)]
        rich_text_value: Option<Value>,
    },
    UrlTextInput {
        #[serde(default)]
        value: Option<String>,
    },
    EmailTextInput {
        #[serde(default)]
        value: Option<String>,
    },
    NumberInput {
        #[serde(default)]
        value: Option<String>,
    },
}

impl ActionElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Button { .. } => ElementKind::Button,
            Self::Checkboxes { .. } => ElementKind::Checkboxes,
            Self::Datepicker { .. } => ElementKind::Datepicker,
            Self::Datetimepicker { .. } => ElementKind::Datetimepicker,
            Self::Timepicker { .. } => ElementKind::Timepicker,
            Self::StaticSelect { .. } => ElementKind::StaticSelect,
            Self::ExternalSelect { .. } => ElementKind::ExternalSelect,
            Self::UsersSelect { .. } => ElementKind::UsersSelect,
            Self::ConversationsSelect { .. } => ElementKind::ConversationsSelect,
            Self::ChannelsSelect { .. } => ElementKind::ChannelsSelect,
            Self::MultiStaticSelect { .. } => ElementKind::MultiStaticSelect,
            Self::MultiExternalSelect { .. } => ElementKind::MultiExternalSelect,
            Self::MultiUsersSelect { .. } => ElementKind::MultiUsersSelect,
            Self::MultiConversationsSelect { .. } => ElementKind::MultiConversationsSelect,
            Self::MultiChannelsSelect { .. } => ElementKind::MultiChannelsSelect,
            Self::RadioButtons { .. } => ElementKind::RadioButtons,
            Self::Overflow { .. } => ElementKind::Overflow,
            Self::PlainTextInput { .. } => ElementKind::PlainTextInput,
            Self::RichTextInput { .. } => ElementKind::RichTextInput,
            Self::UrlTextInput { .. } => ElementKind::UrlTextInput,
            Self::EmailTextInput { .. } => ElementKind::EmailTextInput,
            Self::NumberInput { .. } => ElementKind::NumberInput,
        }
    }

    /// The single string value carried by the element, if it has one.
    ///
    /// Buttons yield their `value`, text inputs their content and
    /// single-selects the selected option's value or id.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Button { value, .. }
            | Self::PlainTextInput { value }
            | Self::UrlTextInput { value }
            | Self::EmailTextInput { value }
            | Self::NumberInput { value } => value.as_deref(),
            Self::StaticSelect { selected_option }
            | Self::ExternalSelect { selected_option }
            | Self::RadioButtons { selected_option } => {
                selected_option.as_ref().map(|o| o.value.as_str())
            }
            Self::Overflow { selected_option } => Some(&selected_option.value),
            Self::UsersSelect { selected_user } => selected_user.as_deref(),
            Self::ConversationsSelect {
                selected_conversation,
            } => selected_conversation.as_deref(),
            Self::ChannelsSelect { selected_channel } => selected_channel.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// State Values
// =============================================================================

/// The current value of an input element, as reported in `state.values`.
///
/// Buttons and overflow menus hold no state and are therefore absent here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateValue {
    Checkboxes {
        #[serde(default)]
        selected_options: Vec<SelectOption>,
    },
    Datepicker {
        #[serde(default)]
        selected_date: Option<NaiveDate>,
    },
    Datetimepicker {
        #[serde(default, deserialize_with = "ts_seconds_option::deserialize")]
        selected_date_time: Option<DateTime<Utc>>,
    },
    Timepicker {
        #[serde(default, deserialize_with = "hhmm::deserialize")]
        selected_time: Option<NaiveTime>,
        #[serde(default)]
        timezone: Option<String>,
    },
    StaticSelect {
        #[serde(default)]
        selected_option: Option<SelectOption>,
    },
    ExternalSelect {
        #[serde(default)]
        selected_option: Option<SelectOption>,
    },
    UsersSelect {
        #[serde(default)]
        selected_user: Option<String>,
    },
    ConversationsSelect {
        #[serde(default)]
        selected_conversation: Option<String>,
    },
    ChannelsSelect {
        #[serde(default)]
        selected_channel: Option<String>,
    },
    MultiStaticSelect {
        #[serde(default)]
        selected_options: Vec<SelectOption>,
    },
    MultiExternalSelect {
        #[serde(default)]
        selected_options: Vec<SelectOption>,
    },
    MultiUsersSelect {
        #[serde(default)]
        selected_users: Vec<String>,
    },
    MultiConversationsSelect {
        #[serde(default)]
        selected_conversations: Vec<String>,
    },
    MultiChannelsSelect {
        #[serde(default)]
        selected_channels: Vec<String>,
    },
    RadioButtons {
        #[serde(default)]
        selected_option: Option<SelectOption>,
    },
    PlainTextInput {
        #[serde(default)]
        value: Option<String>,
    },
    RichTextInput {
        #[serde(default)]
        rich_text_value: Option<Value>,
    },
    UrlTextInput {
        #[serde(default)]
        value: Option<String>,
    },
    EmailTextInput {
        #[serde(default)]
        value: Option<String>,
    },
    NumberInput {
        #[serde(default)]
        value: Option<String>,
    },
}

impl StateValue {
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Checkboxes { .. } => ElementKind::Checkboxes,
            Self::Datepicker { .. } => ElementKind::Datepicker,
            Self::Datetimepicker { .. } => ElementKind::Datetimepicker,
            Self::Timepicker { .. } => ElementKind::Timepicker,
            Self::StaticSelect { .. } => ElementKind::StaticSelect,
            Self::ExternalSelect { .. } => ElementKind::ExternalSelect,
            Self::UsersSelect { .. } => ElementKind::UsersSelect,
            Self::ConversationsSelect { .. } => ElementKind::ConversationsSelect,
            Self::ChannelsSelect { .. } => ElementKind::ChannelsSelect,
            Self::MultiStaticSelect { .. } => ElementKind::MultiStaticSelect,
            Self::MultiExternalSelect { .. } => ElementKind::MultiExternalSelect,
            Self::MultiUsersSelect { .. } => ElementKind::MultiUsersSelect,
            Self::MultiConversationsSelect { .. } => ElementKind::MultiConversationsSelect,
            Self::MultiChannelsSelect { .. } => ElementKind::MultiChannelsSelect,
            Self::RadioButtons { .. } => ElementKind::RadioButtons,
            Self::PlainTextInput { .. } => ElementKind::PlainTextInput,
            Self::RichTextInput { .. } => ElementKind::RichTextInput,
            Self::UrlTextInput { .. } => ElementKind::UrlTextInput,
            Self::EmailTextInput { .. } => ElementKind::EmailTextInput,
            Self::NumberInput { .. } => ElementKind::NumberInput,
        }
    }

    /// The single string value held by the input, if it has one.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::PlainTextInput { value }
            | Self::UrlTextInput { value }
            | Self::EmailTextInput { value }
            | Self::NumberInput { value } => value.as_deref(),
            Self::StaticSelect { selected_option }
            | Self::ExternalSelect { selected_option }
            | Self::RadioButtons { selected_option } => {
                selected_option.as_ref().map(|o| o.value.as_str())
            }
            Self::UsersSelect { selected_user } => selected_user.as_deref(),
            Self::ConversationsSelect {
                selected_conversation,
            } => selected_conversation.as_deref(),
            Self::ChannelsSelect { selected_channel } => selected_channel.as_deref(),
            _ => None,
        }
    }
}

/// `HH:MM` time strings as sent by the time picker.
mod hhmm {
    use chrono::NaiveTime;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| NaiveTime::parse_from_str(&raw, "%H:%M").map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_type_string() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_type(kind.as_str()), Some(kind));
        }
        assert_eq!(ElementKind::from_type("slider"), None);
    }

    #[test]
    fn test_only_button_and_overflow_are_action_only() {
        let action_only: Vec<_> = ElementKind::ALL
            .into_iter()
            .filter(|k| k.is_action_only())
            .collect();
        assert_eq!(action_only, vec![ElementKind::Button, ElementKind::Overflow]);
    }

    #[test]
    fn test_datepicker_action_decodes_null_date() {
        let action: Action = serde_json::from_value(json!({
            "type": "datepicker",
            "action_id": "pick",
            "block_id": "b1",
            "action_ts": "1.2",
            "selected_date": null
        }))
        .unwrap();
        assert_eq!(action.kind(), ElementKind::Datepicker);
        assert_eq!(
            action.element,
            ActionElement::Datepicker {
                selected_date: None
            }
        );
    }

    #[test]
    fn test_date_and_time_fields_are_typed() {
        let action: Action = serde_json::from_value(json!({
            "type": "datepicker",
            "action_id": "pick",
            "block_id": "b1",
            "selected_date": "2024-03-01"
        }))
        .unwrap();
        assert_eq!(
            action.element,
            ActionElement::Datepicker {
                selected_date: NaiveDate::from_ymd_opt(2024, 3, 1)
            }
        );

        let value: StateValue = serde_json::from_value(json!({
            "type": "timepicker",
            "selected_time": "09:30"
        }))
        .unwrap();
        assert_eq!(
            value,
            StateValue::Timepicker {
                selected_time: NaiveTime::from_hms_opt(9, 30, 0),
                timezone: None
            }
        );

        let value: StateValue = serde_json::from_value(json!({
            "type": "datetimepicker",
            "selected_date_time": 1_700_000_000
        }))
        .unwrap();
        assert_eq!(
            value,
            StateValue::Datetimepicker {
                selected_date_time: DateTime::from_timestamp(1_700_000_000, 0)
            }
        );
    }

    #[test]
    fn test_multi_select_carries_option_list() {
        let action: Action = serde_json::from_value(json!({
            "type": "multi_static_select",
            "action_id": "choose",
            "block_id": "b",
            "selected_options": [
                { "text": { "type": "plain_text", "text": "A" }, "value": "a" },
                { "text": { "type": "plain_text", "text": "B" }, "value": "b" }
            ]
        }))
        .unwrap();
        match action.element {
            ActionElement::MultiStaticSelect { selected_options } => {
                let values: Vec<_> = selected_options.iter().map(|o| o.value.as_str()).collect();
                assert_eq!(values, ["a", "b"]);
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn test_button_value() {
        let action: Action = serde_json::from_value(json!({
            "type": "button",
            "action_id": "approve",
            "block_id": "req",
            "text": { "type": "plain_text", "text": "Approve" },
            "value": "42"
        }))
        .unwrap();
        assert_eq!(action.element.value(), Some("42"));
    }

    #[test]
    fn test_button_is_not_a_state_value() {
        let result: Result<StateValue, _> = serde_json::from_value(json!({
            "type": "button",
            "text": { "type": "plain_text", "text": "x" }
        }));
        assert!(result.is_err());
    }
}
