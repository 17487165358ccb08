//! Configuration reload task.
//!
//! # Responsibilities
//! - Turn change notifications into a fresh [`Settings`](crate::config::Settings) load
//! - Hand successfully loaded settings to the pool manager
//! - Keep the current configuration when a reload fails
//!
//! # Design Decisions
//! - Bursts of notifications (one editor save often emits several) collapse
//!   into a single load
//! - A reload that fails to load or validate never tears down live pools
//! - A reload that yields the running settings leaves the pools alone

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::source::ConfigSource;
use crate::config::watcher::ConfigChange;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::pool::{ConnectionFactory, ConnectionPoolManager};
use crate::registry::RegistryConnector;

/// Quiet period after a notification before the file is read.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Reload until shutdown fires or every change sender is dropped.
pub async fn run_reload_loop<F, C>(
    manager: Arc<ConnectionPoolManager<F>>,
    source: ConfigSource<C>,
    mut changes: mpsc::UnboundedReceiver<ConfigChange>,
    mut shutdown: ShutdownSignal,
) where
    F: ConnectionFactory,
    C: RegistryConnector,
{
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Reload loop stopping");
                break;
            }
            change = changes.recv() => {
                let Some(change) = change else {
                    tracing::debug!("Change channel closed, reload loop stopping");
                    break;
                };

                tokio::time::sleep(RELOAD_DEBOUNCE).await;
                let mut coalesced = 0usize;
                while changes.try_recv().is_ok() {
                    coalesced += 1;
                }

                tracing::info!(path = %change.path.display(), coalesced, "Reloading configuration");
                match source.load().await {
                    Ok(settings) if settings == *manager.resolver().settings() => {
                        tracing::debug!(path = %source.path().display(), "Configuration unchanged, keeping pools");
                    }
                    Ok(settings) => manager.reconfigure(settings),
                    Err(e) => tracing::error!(
                        path = %source.path().display(),
                        error = %e,
                        "Failed to reload config. Keeping current configuration."
                    ),
                }
            }
        }
    }
}
