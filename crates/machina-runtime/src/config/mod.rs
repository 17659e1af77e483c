//! Configuration for the Machina runtime.
//!
//! Configuration is layered with figment (see [`loader`]) into a
//! [`MachinaConfig`], checked by [`validate_config`], and then split into the
//! bot identity, the logging setup and the plugin [`Settings`](machina_framework::Settings).

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile};
pub use schema::{
    BotConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MachinaConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
