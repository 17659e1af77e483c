//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use machina_framework::settings::{ALIASES, LOG_HANDLED_MESSAGES, ROOT_USER};
use machina_framework::{BotIdentity, DEFAULT_BUS_CAPACITY, Settings};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachinaConfig {
    /// The bot identity and dispatch options.
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Free-form plugin settings. Keys are case-insensitive.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl MachinaConfig {
    pub fn bot_identity(&self) -> BotIdentity {
        BotIdentity::new(&self.bot.bot_id, &self.bot.bot_name)
    }

    /// Resolves the settings handed to plugins.
    ///
    /// The `[settings]` table comes first; the `[bot]` options that are set
    /// override the matching keys.
    pub fn to_settings(&self) -> Settings {
        let mut settings: Settings = self.settings.iter().map(|(k, v)| (k, v.clone())).collect();
        if !self.bot.aliases.is_empty() {
            settings.insert(ALIASES, self.bot.aliases.join(","));
        }
        if let Some(root_user) = &self.bot.root_user {
            settings.insert(ROOT_USER, root_user.as_str());
        }
        if self.bot.log_handled_messages {
            settings.insert(LOG_HANDLED_MESSAGES, true);
        }
        settings
    }
}

/// The `[bot]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// The bot's user id, as used in `<@…>` mentions.
    #[serde(default)]
    pub bot_id: String,

    /// The bot's user name.
    #[serde(default)]
    pub bot_name: String,

    /// Extra prefixes that address the bot, e.g. `!`.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// A user that satisfies every role requirement.
    #[serde(default)]
    pub root_user: Option<String>,

    /// Log every handled message at info level.
    #[serde(default)]
    pub log_handled_messages: bool,

    /// Buffered events per event-bus subscriber.
    #[serde(default = "default_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_id: String::new(),
            bot_name: String::new(),
            aliases: Vec::new(),
            root_user: None,
            log_handled_messages: false,
            event_bus_capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    DEFAULT_BUS_CAPACITY
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// The `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `machina_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_options_become_settings() {
        let mut config = MachinaConfig::default();
        config.settings.insert("api_token".into(), Value::from("secret"));
        config.settings.insert("aliases".into(), Value::from("?"));
        config.bot.aliases = vec!["!".into(), "machina ".into()];
        config.bot.root_user = Some("U0".into());

        let settings = config.to_settings();
        assert_eq!(settings.get_str("API_TOKEN"), Some("secret"));
        assert_eq!(settings.aliases(), ["!", "machina"]);
        assert_eq!(settings.root_user(), Some("U0"));
        assert_eq!(settings.get_bool(LOG_HANDLED_MESSAGES), None);
    }

    #[test]
    fn test_log_level_names() {
        let level: LogLevel = serde_json::from_value(Value::from("warn")).unwrap();
        assert_eq!(level, LogLevel::Warn);
        assert_eq!(level.to_tracing_level(), tracing::Level::WARN);
        assert!(serde_json::from_value::<LogLevel>(Value::from("loud")).is_err());
    }
}
