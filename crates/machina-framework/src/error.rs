//! Error types for the Machina framework.

use thiserror::Error;

/// Errors raised while compiling a routing rule.
#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    /// The regular expression does not compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Error reported by the regex engine.
        source: regex::Error,
    },
}

/// Reasons for rejecting a plugin at startup.
///
/// A rejected plugin contributes no handler to the registry.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Another plugin with the same name was already loaded.
    #[error("a plugin named '{0}' is already registered")]
    DuplicatePlugin(String),

    /// The plugin name can't be used as a storage namespace.
    #[error("plugin name '{0}' is reserved or contains ':'")]
    ReservedName(String),

    /// Required settings are absent from the resolved configuration.
    #[error("missing required settings: {}", .0.join(", "))]
    MissingSettings(Vec<String>),

    /// A handler was declared without a single rule, so nothing could route to it.
    #[error("handler '{handler}' declares no rule")]
    NoRules {
        /// Qualified handler name.
        handler: String,
    },

    /// A block-action rule sets neither `action_id` nor `block_id`.
    #[error("handler '{handler}' declares a block action without action_id or block_id")]
    EmptyBlockActionSelector {
        /// Qualified handler name.
        handler: String,
    },

    /// A modal-closure handler was declared streaming.
    #[error("modal closure handler '{handler}' cannot be streaming")]
    StreamingClosure {
        /// Qualified handler name.
        handler: String,
    },

    /// A rule pattern does not compile.
    #[error("handler '{handler}': {source}")]
    InvalidPattern {
        /// Qualified handler name.
        handler: String,
        /// Compilation failure.
        source: MatcherError,
    },

    /// The slash command is already handled by another handler.
    #[error("command '{command}' is already handled by '{existing}'")]
    DuplicateCommand {
        /// The contested command.
        command: String,
        /// Qualified name of the handler that owns it.
        existing: String,
    },

    /// Two rules of the plugin produced the same registry key.
    #[error("duplicate registry key '{0}'")]
    DuplicateKey(String),

    /// The plugin's init hook failed.
    #[error("plugin initialisation failed: {0:#}")]
    InitFailed(anyhow::Error),
}

/// Result type for registration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
