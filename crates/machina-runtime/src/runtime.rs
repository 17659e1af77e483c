//! Runtime orchestration.
//!
//! [`MachinaRuntime`] ties the pieces together: it validates the
//! configuration, installs logging, loads the registered plugins into a
//! [`Dispatcher`] and then pumps [`InboundRequest`]s from the transport into
//! it, one task per request, until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use machina_runtime::MachinaRuntime;
//!
//! let runtime = MachinaRuntime::builder()
//!     .config_file("machina.toml")
//!     .plugin(GREETER)
//!     .build(client)?;
//!
//! // `requests` is the receiving half the transport feeds.
//! let stats = runtime.run(requests).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use machina_core::{InboundRequest, SlackClient, StorageBackend};
use machina_framework::{
    DispatchReport, Dispatcher, EventBus, LoadReport, MemoryStorage, PluginDescriptor,
    PluginManager, Services,
};

use crate::config::{ConfigLoader, MachinaConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Totals collected by the request pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Requests taken from the transport.
    pub requests: usize,
    pub handlers_invoked: usize,
    /// Handlers that returned an error or panicked.
    pub handler_failures: usize,
    /// Message handlers skipped by a role gate.
    pub denied: usize,
    /// Dispatch tasks that did not run to completion.
    pub aborted: usize,
}

impl RuntimeStats {
    fn record(&mut self, outcome: Result<DispatchReport, JoinError>) {
        match outcome {
            Ok(report) => {
                self.handlers_invoked += report.invoked;
                self.handler_failures += report.failed + report.panicked;
                self.denied += report.denied;
            }
            Err(e) => {
                error!(error = %e, "Dispatch task did not complete");
                self.aborted += 1;
            }
        }
    }
}

/// The Machina runtime.
pub struct MachinaRuntime {
    config: MachinaConfig,
    manager: PluginManager,
    started: bool,
}

impl MachinaRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// Validates the configuration and installs the global subscriber
    /// described by its `[logging]` section, unless one is already installed.
    pub fn from_config(
        config: MachinaConfig,
        client: Arc<dyn SlackClient>,
        storage: Arc<dyn StorageBackend>,
    ) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let services = Services::new(client, storage, config.to_settings())
            .with_bus(EventBus::new(config.bot.event_bus_capacity));

        info!(
            bot_id = %config.bot.bot_id,
            bot_name = %config.bot.bot_name,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            manager: PluginManager::new(services),
            started: false,
        })
    }

    pub fn config(&self) -> &MachinaConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        self.manager.services()
    }

    pub fn register_plugin(&mut self, descriptor: PluginDescriptor) -> &mut Self {
        self.manager.register(descriptor);
        self
    }

    pub fn register_plugins(
        &mut self,
        descriptors: impl IntoIterator<Item = PluginDescriptor>,
    ) -> &mut Self {
        for descriptor in descriptors {
            self.manager.register(descriptor);
        }
        self
    }

    pub fn plugin_count(&self) -> usize {
        self.manager.plugin_count()
    }

    /// Loads every registered plugin and builds the dispatcher.
    ///
    /// Rejected plugins are reported, not fatal. Can only be called once.
    pub async fn start(&mut self) -> RuntimeResult<(Arc<Dispatcher>, LoadReport)> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.started = true;

        let (registry, report) = self.manager.load_all().await;
        let dispatcher = Dispatcher::new(
            registry,
            self.manager.services(),
            self.config.bot_identity(),
        )?;

        if !report.is_clean() {
            warn!(
                rejected = report.rejected.len(),
                "Some plugins were rejected and will not handle requests"
            );
        }
        info!(
            plugins = report.loaded.len(),
            handlers = dispatcher.registry().len(),
            "Runtime started"
        );

        Ok((Arc::new(dispatcher), report))
    }

    /// Runs until the request channel closes, Ctrl+C or SIGTERM.
    pub async fn run(self, requests: mpsc::Receiver<InboundRequest>) -> RuntimeResult<RuntimeStats> {
        let shutdown = CancellationToken::new();
        let signal_task = tokio::spawn(cancel_on_signal(shutdown.clone()));

        info!("Machina runtime is now running. Press Ctrl+C to stop.");
        let result = self.run_until(requests, shutdown).await;

        signal_task.abort();
        result
    }

    /// Runs until the request channel closes or `shutdown` is cancelled.
    ///
    /// Every request is dispatched on its own task. On shutdown no new
    /// requests are taken, and the ones in flight are awaited.
    pub async fn run_until(
        mut self,
        mut requests: mpsc::Receiver<InboundRequest>,
        shutdown: CancellationToken,
    ) -> RuntimeResult<RuntimeStats> {
        let (dispatcher, _report) = self.start().await?;
        let mut tasks = JoinSet::new();
        let mut stats = RuntimeStats::default();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                Some(outcome) = tasks.join_next(), if !tasks.is_empty() => {
                    stats.record(outcome);
                }
                inbound = requests.recv() => {
                    let Some(inbound) = inbound else {
                        info!("Request channel closed");
                        break;
                    };
                    stats.requests += 1;
                    let dispatcher = Arc::clone(&dispatcher);
                    tasks.spawn(async move {
                        let InboundRequest { connection, request } = inbound;
                        dispatcher.handle_request(connection.as_ref(), request).await
                    });
                }
            }
        }

        if !tasks.is_empty() {
            debug!(in_flight = tasks.len(), "Waiting for in-flight requests");
        }
        while let Some(outcome) = tasks.join_next().await {
            stats.record(outcome);
        }

        info!(
            requests = stats.requests,
            handlers_invoked = stats.handlers_invoked,
            handler_failures = stats.handler_failures,
            "Runtime stopped"
        );
        Ok(stats)
    }
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    wait_for_shutdown().await;
    shutdown.cancel();
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C, signals are ignored");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder loading the configuration and collecting plugins.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    storage: Option<Arc<dyn StorageBackend>>,
    plugins: Vec<PluginDescriptor>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            storage: None,
            plugins: Vec::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: MachinaConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Storage backend for plugins. Defaults to [`MemoryStorage`].
    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn plugin(mut self, descriptor: PluginDescriptor) -> Self {
        self.plugins.push(descriptor);
        self
    }

    pub fn build(self, client: Arc<dyn SlackClient>) -> RuntimeResult<MachinaRuntime> {
        let config = self.config_loader.load()?;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let mut runtime = MachinaRuntime::from_config(config, client, storage)?;
        runtime.register_plugins(self.plugins);
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use machina_core::{RequestType, SocketModeRequest};
    use machina_framework::testing::{RecordingClient, RecordingConnection};
    use machina_framework::{Command, HandlerResult, HandlerSet, Plugin, PluginContext, bind};

    use super::*;

    static DEPLOYS: AtomicUsize = AtomicUsize::new(0);

    struct Deployer;

    impl Deployer {
        async fn deploy(self: Arc<Self>, cmd: Command) -> HandlerResult {
            DEPLOYS.fetch_add(1, Ordering::SeqCst);
            if cmd.text() == "fail" {
                anyhow::bail!("deploy target refused");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Plugin for Deployer {
        fn declare(self: Arc<Self>, handlers: &mut HandlerSet) {
            handlers.command("deploy", bind(&self, Self::deploy)).command("/deploy");
        }
    }

    fn deployer(_: PluginContext) -> Arc<dyn Plugin> {
        Arc::new(Deployer)
    }

    const DEPLOYER: PluginDescriptor = PluginDescriptor::new("deployer", deployer);
    const LOCKED: PluginDescriptor = PluginDescriptor::new("locked", deployer).requires(&["TOKEN"]);

    fn config() -> MachinaConfig {
        let mut config = MachinaConfig::default();
        config.bot.bot_id = "U0BOT".into();
        config.bot.bot_name = "machina".into();
        config
    }

    fn runtime(config: MachinaConfig) -> MachinaRuntime {
        MachinaRuntime::from_config(
            config,
            Arc::new(RecordingClient::default()),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap()
    }

    fn deploy_request(envelope_id: &str, text: &str) -> SocketModeRequest {
        SocketModeRequest::new(
            RequestType::SlashCommands,
            envelope_id,
            json!({ "command": "/deploy", "text": text, "user_id": "U1", "channel_id": "C1" }),
        )
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = MachinaRuntime::from_config(
            MachinaConfig::default(),
            Arc::new(RecordingClient::default()),
            Arc::new(MemoryStorage::new()),
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_reports_rejected_plugins_and_only_once() {
        let mut runtime = runtime(config());
        runtime.register_plugins([DEPLOYER, LOCKED]);

        let (dispatcher, report) = runtime.start().await.unwrap();
        assert_eq!(report.loaded, ["deployer"]);
        assert_eq!(report.rejected.len(), 1);
        assert!(dispatcher.registry().command("/deploy").is_some());

        assert!(matches!(
            runtime.start().await,
            Err(RuntimeError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_pump_dispatches_until_channel_closes() {
        let before = DEPLOYS.load(Ordering::SeqCst);
        let mut runtime = runtime(config());
        runtime.register_plugin(DEPLOYER);

        let connection = RecordingConnection::new();
        let (tx, rx) = mpsc::channel(8);
        for (id, text) in [("e1", "staging"), ("e2", "fail")] {
            tx.send(InboundRequest::new(connection.clone(), deploy_request(id, text)))
                .await
                .unwrap();
        }
        drop(tx);

        let stats = runtime
            .run_until(rx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.requests, 2);
        assert_eq!(stats.handlers_invoked, 2);
        assert_eq!(stats.handler_failures, 1);
        assert_eq!(stats.aborted, 0);
        assert_eq!(connection.acks().len(), 2);
        assert!(DEPLOYS.load(Ordering::SeqCst) >= before + 2);
    }

    #[tokio::test]
    async fn test_cancelled_pump_takes_no_requests() {
        let runtime = runtime(config());
        let (tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = runtime.run_until(rx, shutdown).await.unwrap();
        assert_eq!(stats, RuntimeStats::default());
        drop(tx);
    }

    #[tokio::test]
    async fn test_builder_applies_overrides() {
        let dir = std::env::temp_dir().join(format!("machina-builder-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let runtime = MachinaRuntime::builder()
            .search_path(&dir)
            .without_env()
            .merge(config())
            .set("bot.aliases", ["!"])
            .set("settings.token", "xoxb")
            .plugin(DEPLOYER)
            .plugin(LOCKED)
            .build(Arc::new(RecordingClient::default()))
            .unwrap();

        assert_eq!(runtime.plugin_count(), 2);
        let settings = &runtime.services().settings;
        assert_eq!(settings.aliases(), ["!"]);
        assert_eq!(settings.get_str("TOKEN"), Some("xoxb"));
    }
}
