//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics from the loaded configuration
//! - Build the pool manager
//! - Start background tasks (file watcher, signal handler, reload loop)
//!
//! # Design Decisions
//! - Fail fast: a missing or malformed configuration is fatal
//! - Pools are not built at startup; the first caller per key builds them
//! - Logging setup is skipped quietly if the host already installed one

use std::net::SocketAddr;
use std::sync::Arc;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::ConfigError;
use crate::config::source::ConfigSource;
use crate::config::watcher::{ConfigChange, ConfigWatcher};
use crate::lifecycle::reload::run_reload_loop;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::{logging, metrics};
use crate::pool::{ConnectionFactory, ConnectionPoolManager};
use crate::registry::RegistryConnector;

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid metrics address `{address}`: {source}")]
    MetricsAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to watch configuration file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

/// Which background services [`start`] brings up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Install the global tracing subscriber.
    pub init_logging: bool,
    /// Reload when the configuration file changes.
    pub watch_config: bool,
    /// Shut down on SIGTERM/SIGINT, reload on SIGHUP.
    pub handle_signals: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            init_logging: true,
            watch_config: true,
            handle_signals: true,
        }
    }
}

/// A started pooling core and its background tasks.
pub struct Runtime<F: ConnectionFactory> {
    manager: Arc<ConnectionPoolManager<F>>,
    shutdown: Shutdown,
    reload_tx: mpsc::UnboundedSender<ConfigChange>,
    reload_task: JoinHandle<()>,
    signal_task: Option<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

/// Load configuration and bring up the pooling core.
pub async fn start<F, C>(
    source: ConfigSource<C>,
    factory: F,
    options: StartOptions,
) -> Result<Runtime<F>, StartupError>
where
    F: ConnectionFactory,
    C: RegistryConnector + 'static,
{
    let settings = source.load().await?;

    if options.init_logging && logging::init_logging(&settings.observability).is_err() {
        tracing::debug!("Tracing subscriber already installed, keeping it");
    }

    if let Some(address) = &settings.observability.metrics_address {
        let addr: SocketAddr = address.parse().map_err(|source| StartupError::MetricsAddress {
            address: address.clone(),
            source,
        })?;
        metrics::init_metrics(addr)?;
    }

    let manager = Arc::new(ConnectionPoolManager::new(settings, factory));
    let shutdown = Shutdown::new();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();

    let watcher = if options.watch_config {
        Some(ConfigWatcher::with_sender(source.path(), reload_tx.clone()).run()?)
    } else {
        None
    };

    let signal_task = if options.handle_signals {
        Some(spawn_signal_handler(
            shutdown.clone(),
            reload_tx.clone(),
            source.path().to_path_buf(),
        )?)
    } else {
        None
    };

    let reload_task = tokio::spawn(run_reload_loop(
        Arc::clone(&manager),
        source,
        reload_rx,
        shutdown.subscribe(),
    ));

    tracing::info!(
        watch_config = options.watch_config,
        handle_signals = options.handle_signals,
        "Pooling core started"
    );

    Ok(Runtime {
        manager,
        shutdown,
        reload_tx,
        reload_task,
        signal_task,
        _watcher: watcher,
    })
}

impl<F: ConnectionFactory> Runtime<F> {
    pub fn manager(&self) -> &Arc<ConnectionPoolManager<F>> {
        &self.manager
    }

    /// Ask the reload loop to load the configuration again.
    pub fn request_reload(&self, change: ConfigChange) -> bool {
        self.reload_tx.send(change).is_ok()
    }

    /// Coordinator shared with the background tasks.
    pub fn shutdown_handle(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Resolve once shutdown has been triggered, by a signal or by hand.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.subscribe().wait().await;
    }

    /// Stop background tasks, then close every pool.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        if let Err(e) = self.reload_task.await {
            tracing::warn!(error = %e, "Reload task ended abnormally");
        }
        if let Some(task) = self.signal_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Signal task ended abnormally");
            }
        }
        self.manager.shutdown();
        tracing::info!("Shutdown complete");
    }
}
