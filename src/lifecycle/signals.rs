//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Trigger appropriate actions (shutdown, reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::watcher::ConfigChange;
use crate::lifecycle::shutdown::Shutdown;

/// Install handlers and forward signals until shutdown is triggered.
///
/// Handlers are registered before this returns, so a signal delivered
/// afterwards never falls through to the default action.
#[cfg(unix)]
pub fn spawn_signal_handler(
    shutdown: Shutdown,
    reload_tx: mpsc::UnboundedSender<ConfigChange>,
    config_path: PathBuf,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut stopped = shutdown.subscribe();

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = terminate.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    shutdown.trigger();
                    break;
                }
                _ = interrupt.recv() => {
                    tracing::info!("SIGINT received, shutting down");
                    shutdown.trigger();
                    break;
                }
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, reloading configuration");
                    if reload_tx.send(ConfigChange { path: config_path.clone() }).is_err() {
                        break;
                    }
                }
                _ = stopped.wait() => break,
            }
        }
    }))
}

/// Forward Ctrl-C as shutdown. Reload is left to the file watcher.
#[cfg(not(unix))]
pub fn spawn_signal_handler(
    shutdown: Shutdown,
    _reload_tx: mpsc::UnboundedSender<ConfigChange>,
    _config_path: PathBuf,
) -> std::io::Result<JoinHandle<()>> {
    let mut stopped = shutdown.subscribe();
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::info!("Ctrl-C received, shutting down");
                    shutdown.trigger();
                }
            }
            _ = stopped.wait() => {}
        }
    }))
}
