//! Small shared objects that appear inside interactive payloads.

use serde::Deserialize;

/// The user who triggered an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

impl User {
    /// Best display name available for this user.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Enterprise {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The channel an interaction happened in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A text composition object (`plain_text` or `mrkdwn`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Text {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
    #[serde(default)]
    pub emoji: Option<bool>,
    #[serde(default)]
    pub verbatim: Option<bool>,
}

/// An option of a select menu, checkbox group, radio group or overflow menu.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub text: Text,
    pub value: String,
    #[serde(default)]
    pub description: Option<Text>,
    #[serde(default)]
    pub url: Option<String>,
}
