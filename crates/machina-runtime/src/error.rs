//! Runtime error types.

use thiserror::Error;

use machina_framework::MatcherError;

use crate::config::ConfigError;

/// Errors that can occur while building or starting the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The bot identity or an alias could not be turned into a mention matcher.
    #[error("Invalid bot identity: {0}")]
    Identity(#[from] MatcherError),

    #[error("Runtime already started")]
    AlreadyStarted,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
