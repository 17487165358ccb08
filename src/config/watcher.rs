//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Notification that the watched file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub path: PathBuf,
}

/// A watcher that monitors the configuration file for changes.
///
/// Loading is left to the receiver, since a reload may need to reach the
/// registry and that is async work.
pub struct ConfigWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<ConfigChange>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for change notifications.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigChange>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        (Self::with_sender(path, change_tx), change_rx)
    }

    /// Create a watcher that reports into an existing channel.
    pub fn with_sender(path: &Path, change_tx: mpsc::UnboundedSender<ConfigChange>) -> Self {
        Self {
            path: path.to_path_buf(),
            change_tx,
        }
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Config file change detected");
                        if tx.send(ConfigChange { path: path.clone() }).is_err() {
                            tracing::debug!("Reload loop gone, dropping change notification");
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
