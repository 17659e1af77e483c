//! Machina Runtime - configuration, logging and the request pump.
//!
//! This crate provides:
//! - Layered configuration with figment ([`ConfigLoader`], [`MachinaConfig`])
//! - Logging setup from configuration ([`LoggingBuilder`])
//! - The [`MachinaRuntime`], which loads plugins and feeds inbound requests
//!   from the transport to the dispatcher until shutdown
//!
//! The transport itself is not part of this crate. It implements
//! `SocketConnection` and `SlackClient` from `machina-core` and sends each
//! received envelope as an `InboundRequest` into the channel given to
//! [`MachinaRuntime::run`].
//!
//! ```ignore
//! use machina_runtime::MachinaRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, requests) = my_transport::connect().await?;
//!     let runtime = MachinaRuntime::builder()
//!         .plugin(GREETER)
//!         .build(client)?;
//!
//!     // Run until Ctrl+C
//!     runtime.run(requests).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, MachinaConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{MachinaRuntime, RuntimeBuilder, RuntimeStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
