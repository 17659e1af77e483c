//! # Machina Framework
//!
//! Plugin model and dispatch engine of the Machina chat-bot runtime.
//!
//! This layer provides:
//! - The [`Plugin`] trait and static [`PluginDescriptor`]s
//! - Fluent handler declarations on a [`HandlerSet`] (`listen_to`, `respond_to`,
//!   `process`, `command`, `block_action`, `modal_submission`, `modal_closure`)
//! - The [`RegisteredActions`] registry, built once by the [`PluginManager`]
//! - Mention resolution and the [`Dispatcher`] that routes inbound requests
//! - Typed handler contexts with a per-invocation [`ScopedLogger`]
//! - Role gating, namespaced plugin storage and an in-process event bus
//!
//! The framework never talks to the network itself: everything outbound goes
//! through the traits of `machina-core`.

pub mod bus;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod manager;
pub mod matcher;
pub mod mention;
pub mod plugin;
pub mod registry;
pub mod roles;
pub mod settings;
pub mod storage;

// Recording doubles for SlackClient and SocketConnection
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bus::{BotEvent, DEFAULT_BUS_CAPACITY, EventBus, UnauthorizedAccess};
pub use context::{
    BlockAction, Command, Message, ModalClosure, ModalSubmission, RawEvent, ScopedLogger,
};
pub use dispatcher::{BotIdentity, DispatchReport, Dispatcher};
pub use error::{MatcherError, RegistrationError, RegistrationResult};
pub use handler::{ActionSelector, HandlerResult, HandlerSet, MessageRule, bind};
pub use manager::{LoadReport, PluginLoadState, PluginManager};
pub use matcher::{IdMatcher, IdSelector, MatcherConfig, RoleRequirement};
pub use mention::{Addressing, MentionResolver};
pub use plugin::{Plugin, PluginContext, PluginDescriptor, Services};
pub use registry::RegisteredActions;
pub use roles::RoleStore;
pub use settings::Settings;
pub use storage::{MemoryStorage, PluginStorage};
