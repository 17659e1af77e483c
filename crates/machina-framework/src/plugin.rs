//! Plugin system.
//!
//! # Architecture
//!
//! A plugin is any type implementing [`Plugin`]. It is identified by a
//! [`PluginDescriptor`], a static `Copy` handle carrying the plugin name, the
//! settings it requires and a factory function. At startup the
//! [`PluginManager`](crate::manager::PluginManager):
//!
//! 1. checks the required settings,
//! 2. instantiates the plugin with its [`PluginContext`],
//! 3. collects its handler declarations through [`Plugin::declare`],
//! 4. validates them, runs [`Plugin::init`], and merges them into the registry.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use machina::prelude::*;
//!
//! struct Greeter {
//!     ctx: PluginContext,
//! }
//!
//! impl Greeter {
//!     async fn greet(self: Arc<Self>, msg: Message) -> HandlerResult {
//!         msg.reply("hello!").await?;
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
//! fn create(ctx: PluginContext) -> Arc<dyn Plugin> {
//!     Arc::new(Greeter { ctx })
//! }
//!
//! pub static GREETER: PluginDescriptor = PluginDescriptor::new("greeter", create);
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use machina_core::{SlackClient, StorageBackend};

use crate::bus::EventBus;
use crate::handler::HandlerSet;
use crate::roles::RoleStore;
use crate::settings::Settings;
use crate::storage::PluginStorage;

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// A unit of bot behaviour.
///
/// Plugins are `Send + Sync` and shared between concurrently running
/// handlers; use interior mutability, or [`PluginStorage`], for state.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Called once at startup, after the declarations validated and before
    /// any handler can run. An error rejects the plugin.
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Declares the plugin's handlers.
    fn declare(self: Arc<Self>, handlers: &mut HandlerSet);
}

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

/// A static, `Copy` descriptor that identifies and instantiates a plugin.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Plugin name, used in logs, registry keys and as storage namespace.
    pub name: &'static str,

    /// Settings that must be present for the plugin to load.
    pub required_settings: &'static [&'static str],

    /// Factory function that creates the live plugin.
    pub create: fn(PluginContext) -> Arc<dyn Plugin>,
}

impl PluginDescriptor {
    pub const fn new(name: &'static str, create: fn(PluginContext) -> Arc<dyn Plugin>) -> Self {
        Self {
            name,
            required_settings: &[],
            create,
        }
    }

    pub const fn requires(mut self, settings: &'static [&'static str]) -> Self {
        self.required_settings = settings;
        self
    }

    #[inline]
    pub fn instantiate(&self, ctx: PluginContext) -> Arc<dyn Plugin> {
        (self.create)(ctx)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("required_settings", &self.required_settings)
            .finish_non_exhaustive()
    }
}

// ─── Services ─────────────────────────────────────────────────────────────────

/// The shared collaborators every plugin and the dispatcher work with.
#[derive(Clone)]
pub struct Services {
    pub client: Arc<dyn SlackClient>,
    pub storage: Arc<dyn StorageBackend>,
    pub bus: EventBus,
    pub settings: Arc<Settings>,
}

impl Services {
    pub fn new(
        client: Arc<dyn SlackClient>,
        storage: Arc<dyn StorageBackend>,
        settings: Settings,
    ) -> Self {
        Self {
            client,
            storage,
            bus: EventBus::default(),
            settings: Arc::new(settings),
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn roles(&self) -> RoleStore {
        RoleStore::new(
            Arc::clone(&self.storage),
            self.settings.root_user().map(str::to_owned),
        )
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ─── PluginContext ────────────────────────────────────────────────────────────

/// What a plugin gets at construction.
#[derive(Clone)]
pub struct PluginContext {
    name: &'static str,
    services: Services,
    storage: PluginStorage,
}

impl PluginContext {
    pub fn new(name: &'static str, services: Services) -> Self {
        let storage = PluginStorage::new(name, Arc::clone(&services.storage));
        Self {
            name,
            services,
            storage,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.services.settings
    }

    /// Storage namespaced to this plugin.
    pub fn storage(&self) -> &PluginStorage {
        &self.storage
    }

    pub fn bus(&self) -> &EventBus {
        &self.services.bus
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.services.client
    }

    pub fn roles(&self) -> RoleStore {
        self.services.roles()
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
