//! Domains file watcher for hot reload.
//!
//! The management interface persists CRUD changes itself; the watcher
//! covers external edits to the domains file, so updates made outside the
//! process become visible to new requests without a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;

use crate::registry::{DomainConfig, DomainRegistry};

/// A watcher that monitors the domains file for changes.
pub struct DomainsWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<DomainConfig>>,
}

impl DomainsWatcher {
    /// Create a new watcher.
    ///
    /// Returns the watcher and a receiver for reloaded domain tables.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<DomainConfig>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned `RecommendedWatcher` must be kept alive for the watch
    /// to stay registered.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Domains file change detected, reloading...");
                        match DomainRegistry::parse_file(&path) {
                            Ok(domains) => {
                                let _ = tx.send(domains);
                            }
                            Err(e) => {
                                tracing::error!("Failed to reload domains: {}. Keeping current table.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Domains watcher started");
        Ok(watcher)
    }
}
