//! Plugin lifecycle management.
//!
//! [`PluginManager`] owns every registered [`PluginDescriptor`]. On
//! [`load_all`](PluginManager::load_all) it walks them in registration order
//! and, for each one:
//!
//! - rejects duplicate or reserved names and plugins whose required settings
//!   are missing,
//! - instantiates the plugin and collects its [`HandlerSet`],
//! - stages the declarations into a private registry, compiling every pattern,
//! - checks the staged registry against what is already loaded,
//! - runs [`Plugin::init`](crate::plugin::Plugin::init),
//! - merges the staged registry.
//!
//! Any failure marks the plugin [`PluginLoadState::Failed`] and leaves the
//! registry exactly as it was; the remaining plugins still load.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut manager = PluginManager::new(services);
//! manager.register(GREETER);
//! let (registry, report) = manager.load_all().await;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::HandlerSet;
use crate::plugin::{Plugin, PluginContext, PluginDescriptor, Services};
use crate::registry::RegisteredActions;
use crate::roles::RBAC_NAMESPACE;

/// Lifecycle state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginLoadState {
    /// Registered but not yet loaded.
    Registered,
    /// Loaded; its handlers are in the registry.
    Active,
    /// Rejected at load time.
    Failed,
}

struct PluginEntry {
    descriptor: PluginDescriptor,
    state: PluginLoadState,
    plugin: Option<Arc<dyn Plugin>>,
}

/// Outcome of [`PluginManager::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of the plugins that loaded, in order.
    pub loaded: Vec<String>,
    /// Rejected plugins with the reason.
    pub rejected: Vec<(String, RegistrationError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Central owner of all registered plugins.
pub struct PluginManager {
    services: Services,
    plugins: Vec<PluginEntry>,
}

impl PluginManager {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            plugins: Vec::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Registers a plugin. Nothing is instantiated until [`load_all`](Self::load_all).
    pub fn register(&mut self, descriptor: PluginDescriptor) -> &mut Self {
        info!(plugin = %descriptor.name, "Plugin registered");
        self.plugins.push(PluginEntry {
            descriptor,
            state: PluginLoadState::Registered,
            plugin: None,
        });
        self
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// State of the first plugin registered under `name`.
    pub fn plugin_state(&self, name: &str) -> Option<PluginLoadState> {
        self.plugins
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| e.state)
    }

    /// The live instance of an active plugin.
    pub fn plugin(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|e| e.descriptor.name == name && e.state == PluginLoadState::Active)
            .and_then(|e| e.plugin.as_ref())
    }

    /// Loads every registered plugin and returns the frozen registry.
    ///
    /// Plugins are loaded one at a time, in registration order, so that the
    /// first plugin to claim a slash command keeps it.
    pub async fn load_all(&mut self) -> (Arc<RegisteredActions>, LoadReport) {
        let mut registry = RegisteredActions::new();
        let mut report = LoadReport::default();
        let mut names = HashSet::new();

        for entry in &mut self.plugins {
            if entry.state != PluginLoadState::Registered {
                continue;
            }
            let name = entry.descriptor.name;

            if is_reserved_name(name) {
                warn!(plugin = %name, "Plugin name would share a storage namespace; ignored");
                entry.state = PluginLoadState::Failed;
                report
                    .rejected
                    .push((name.to_owned(), RegistrationError::ReservedName(name.to_owned())));
                continue;
            }

            if !names.insert(name) {
                warn!(plugin = %name, "Duplicate plugin name; later registration ignored");
                entry.state = PluginLoadState::Failed;
                report
                    .rejected
                    .push((name.to_owned(), RegistrationError::DuplicatePlugin(name.to_owned())));
                continue;
            }

            match load_one(&entry.descriptor, &self.services, &registry).await {
                Ok((plugin, staged)) => {
                    let handler_count = staged.len();
                    match registry.merge(staged) {
                        Ok(()) => {
                            entry.state = PluginLoadState::Active;
                            entry.plugin = Some(plugin);
                            info!(plugin = %name, handlers = handler_count, "Plugin loaded and active");
                            report.loaded.push(name.to_owned());
                        }
                        Err(e) => {
                            error!(plugin = %name, error = %e, "Plugin rejected");
                            entry.state = PluginLoadState::Failed;
                            report.rejected.push((name.to_owned(), e));
                        }
                    }
                }
                Err(e) => {
                    error!(plugin = %name, error = %e, "Plugin rejected");
                    entry.state = PluginLoadState::Failed;
                    report.rejected.push((name.to_owned(), e));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            rejected = report.rejected.len(),
            handlers = registry.len(),
            "Plugins loaded"
        );
        (Arc::new(registry), report)
    }
}

/// Plugin names double as storage namespaces, so they may not contain the
/// namespace separator or take the role store's namespace.
fn is_reserved_name(name: &str) -> bool {
    name == RBAC_NAMESPACE || name.contains(':')
}

async fn load_one(
    descriptor: &PluginDescriptor,
    services: &Services,
    registry: &RegisteredActions,
) -> RegistrationResult<(Arc<dyn Plugin>, RegisteredActions)> {
    let missing = services.settings.missing(descriptor.required_settings);
    if !missing.is_empty() {
        return Err(RegistrationError::MissingSettings(
            missing.into_iter().map(str::to_owned).collect(),
        ));
    }

    let plugin = descriptor.instantiate(PluginContext::new(descriptor.name, services.clone()));
    let mut handlers = HandlerSet::new();
    Arc::clone(&plugin).declare(&mut handlers);

    let staged = RegisteredActions::stage(descriptor.name, handlers)?;
    registry.check_merge(&staged)?;

    plugin.init().await.map_err(RegistrationError::InitFailed)?;
    Ok((plugin, staged))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::context::{Command, Message};
    use crate::handler::{HandlerResult, bind};
    use crate::settings::Settings;
    use crate::storage::MemoryStorage;
    use crate::testing::RecordingClient;

    static INIT_CALLED: AtomicBool = AtomicBool::new(false);

    struct Echo;

    impl Echo {
        async fn echo(self: Arc<Self>, _msg: Message) -> HandlerResult {
            Ok(())
        }

        async fn deploy(self: Arc<Self>, _cmd: Command) -> HandlerResult {
            Ok(())
        }
    }

    #[async_trait]
    impl Plugin for Echo {
        async fn init(&self) -> anyhow::Result<()> {
            INIT_CALLED.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn declare(self: Arc<Self>, handlers: &mut HandlerSet) {
            handlers.message("echo", bind(&self, Self::echo)).listen_to("echo (.*)");
            handlers.command("deploy", bind(&self, Self::deploy)).command("/deploy");
        }
    }

    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        async fn init(&self) -> anyhow::Result<()> {
            anyhow::bail!("database unreachable")
        }

        fn declare(self: Arc<Self>, handlers: &mut HandlerSet) {
            handlers
                .message("hello", |_msg: Message| async { Ok::<(), anyhow::Error>(()) })
                .listen_to("hello");
        }
    }

    struct Thief;

    #[async_trait]
    impl Plugin for Thief {
        fn declare(self: Arc<Self>, handlers: &mut HandlerSet) {
            handlers
                .message("steal", |_msg: Message| async { Ok::<(), anyhow::Error>(()) })
                .listen_to("mine");
            handlers
                .command("deploy", |_cmd: Command| async { Ok::<(), anyhow::Error>(()) })
                .command("deploy");
        }
    }

    fn echo(_: PluginContext) -> Arc<dyn Plugin> {
        Arc::new(Echo)
    }

    fn broken(_: PluginContext) -> Arc<dyn Plugin> {
        Arc::new(Broken)
    }

    fn thief(_: PluginContext) -> Arc<dyn Plugin> {
        Arc::new(Thief)
    }

    const ECHO: PluginDescriptor = PluginDescriptor::new("echo", echo);
    const BROKEN: PluginDescriptor = PluginDescriptor::new("broken", broken);
    const THIEF: PluginDescriptor = PluginDescriptor::new("thief", thief);
    const NEEDY: PluginDescriptor = PluginDescriptor::new("needy", echo).requires(&["API_TOKEN"]);
    const RBAC: PluginDescriptor = PluginDescriptor::new("rbac", echo);
    const SCOPED: PluginDescriptor = PluginDescriptor::new("ops:deploy", echo);

    fn services(settings: Settings) -> Services {
        Services::new(
            Arc::new(RecordingClient::default()),
            Arc::new(MemoryStorage::new()),
            settings,
        )
    }

    #[tokio::test]
    async fn test_load_all_activates_plugins() {
        let mut manager = PluginManager::new(services(Settings::new()));
        manager.register(ECHO);
        let (registry, report) = manager.load_all().await;

        assert!(report.is_clean());
        assert_eq!(report.loaded, ["echo"]);
        assert_eq!(manager.plugin_state("echo"), Some(PluginLoadState::Active));
        assert!(manager.plugin("echo").is_some());
        assert!(INIT_CALLED.load(Ordering::SeqCst));
        assert!(registry.listen_to().contains_key("echo.echo-echo (.*)"));
        assert!(registry.command("/deploy").is_some());
    }

    #[tokio::test]
    async fn test_failed_init_rejects_plugin() {
        let mut manager = PluginManager::new(services(Settings::new()));
        manager.register(BROKEN).register(ECHO);
        let (registry, report) = manager.load_all().await;

        assert_eq!(report.loaded, ["echo"]);
        assert!(matches!(
            report.rejected.as_slice(),
            [(name, RegistrationError::InitFailed(_))] if name == "broken"
        ));
        assert_eq!(manager.plugin_state("broken"), Some(PluginLoadState::Failed));
        assert!(!registry.listen_to().keys().any(|k| k.starts_with("broken.")));
    }

    #[tokio::test]
    async fn test_command_conflict_rejects_later_plugin_entirely() {
        let mut manager = PluginManager::new(services(Settings::new()));
        manager.register(ECHO).register(THIEF);
        let (registry, report) = manager.load_all().await;

        assert!(matches!(
            report.rejected.as_slice(),
            [(name, RegistrationError::DuplicateCommand { .. })] if name == "thief"
        ));
        assert_eq!(
            registry.command("/deploy").map(|h| h.plugin.as_str()),
            Some("echo")
        );
        assert!(!registry.listen_to().contains_key("thief.steal-mine"));
    }

    #[tokio::test]
    async fn test_missing_settings_rejects_plugin() {
        let mut manager = PluginManager::new(services(Settings::new()));
        manager.register(NEEDY);
        let (registry, report) = manager.load_all().await;

        assert!(registry.is_empty());
        assert!(matches!(
            report.rejected.as_slice(),
            [(_, RegistrationError::MissingSettings(missing))] if missing == &["API_TOKEN"]
        ));

        let mut manager = PluginManager::new(services(Settings::new().with("api_token", "x")));
        manager.register(NEEDY);
        let (_, report) = manager.load_all().await;
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_duplicate_plugin_name_is_rejected() {
        let mut manager = PluginManager::new(services(Settings::new()));
        manager.register(ECHO).register(ECHO);
        let (_, report) = manager.load_all().await;

        assert_eq!(report.loaded, ["echo"]);
        assert!(matches!(
            report.rejected.as_slice(),
            [(_, RegistrationError::DuplicatePlugin(name))] if name == "echo"
        ));
    }

    #[tokio::test]
    async fn test_names_sharing_a_storage_namespace_are_rejected() {
        let mut manager = PluginManager::new(services(Settings::new()));
        manager.register(RBAC).register(SCOPED);
        let (registry, report) = manager.load_all().await;

        assert!(registry.is_empty());
        assert!(report.loaded.is_empty());
        let rejected: Vec<_> = report
            .rejected
            .iter()
            .map(|(name, e)| (name.as_str(), matches!(e, RegistrationError::ReservedName(_))))
            .collect();
        assert_eq!(rejected, [("rbac", true), ("ops:deploy", true)]);
        assert_eq!(manager.plugin_state("rbac"), Some(PluginLoadState::Failed));
    }
}
