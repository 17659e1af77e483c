//! # Machina
//!
//! A plugin-based chat-bot runtime for Slack Socket Mode.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  InboundRequest  ┌─────────┐     ┌────────────┐────▶ listen/respond handlers
//! │ Transport │─────────────────▶│ Runtime │────▶│ Dispatcher │────▶ commands
//! └───────────┘                  └─────────┘     └────────────┘────▶ block actions, modals
//!       ▲                                              │
//!       └──────────── acknowledgement, SlackClient ◀───┘
//! ```
//!
//! - **Core** (`machina-core`): request and payload model, and the
//!   `SocketConnection`, `SlackClient` and `StorageBackend` contracts
//! - **Framework** (`machina-framework`): plugins, the handler registry,
//!   mention resolution, role gating and the dispatcher
//! - **Runtime** (`machina-runtime`): configuration, logging and the request pump
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use machina::prelude::*;
//!
//! struct Greeter;
//!
//! impl Greeter {
//!     async fn greet(self: Arc<Self>, msg: Message) -> HandlerResult {
//!         msg.reply(&format!("hello {}!", msg.at_sender())).await?;
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Greeter {
//!     fn declare(self: Arc<Self>, handlers: &mut HandlerSet) {
//!         handlers.message("greet", bind(&self, Self::greet)).respond_to("^hi$");
//!     }
//! }
//!
//! fn create(_: PluginContext) -> Arc<dyn Plugin> {
//!     Arc::new(Greeter)
//! }
//!
//! static GREETER: PluginDescriptor = PluginDescriptor::new("greeter", create);
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, requests) = my_transport::connect().await?;
//!     MachinaRuntime::builder()
//!         .plugin(GREETER)
//!         .build(client)?
//!         .run(requests)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use machina_core as core;
pub use machina_framework as framework;
pub use machina_runtime as runtime;

/// Commonly used types for writing plugins and starting the runtime.
///
/// ```rust,ignore
/// use machina::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    pub use async_trait::async_trait;

    // Runtime - main entry point
    pub use machina_runtime::{MachinaRuntime, RuntimeBuilder};

    // Plugin system
    pub use machina_framework::{Plugin, PluginContext, PluginDescriptor};

    // Handler declarations
    pub use machina_framework::{ActionSelector, HandlerResult, HandlerSet, MessageRule, bind};

    // Handler contexts
    pub use machina_framework::{
        BlockAction, Command, Message, ModalClosure, ModalSubmission, RawEvent, ScopedLogger,
    };

    // Services available to plugins
    pub use machina_framework::{BotEvent, EventBus, PluginStorage, RoleStore, Settings};

    // Outbound calls
    pub use machina_core::{SendOptions, SlackClient};
}
