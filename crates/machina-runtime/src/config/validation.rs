//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogFormat, LogOutput, LoggingConfig, MachinaConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &MachinaConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.bot_id.is_empty() {
        return Err(ConfigError::missing_field("bot.bot_id"));
    }

    if bot.bot_id.contains(char::is_whitespace) {
        return Err(ConfigError::validation("Bot ID cannot contain spaces"));
    }

    if bot.bot_name.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.bot_name"));
    }

    if bot.aliases.iter().any(|alias| alias.trim().is_empty()) {
        return Err(ConfigError::validation("Aliases cannot be blank"));
    }

    if bot.event_bus_capacity == 0 {
        return Err(ConfigError::validation(
            "Event bus capacity must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target: {target:?}"
        )));
    }

    Ok(())
}
