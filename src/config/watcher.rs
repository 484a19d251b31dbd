//! Configuration file watcher for hot reload.
//!
//! Only the route table is live-reloadable. Editors often emit several
//! modify events per save, so a reload whose routes match the last published
//! set is dropped here instead of rebuilding an identical table.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{GatewayConfig, RouteConfig};

/// Outcome of re-reading the configuration file.
#[derive(Debug)]
pub enum Reload {
    /// Routes differ from the last published set.
    Changed(GatewayConfig),
    /// File parsed and validated, routes are unchanged.
    Unchanged,
    /// File could not be loaded; the current routes stay.
    Failed(ConfigError),
}

/// Re-reads the file and remembers the last route set it published.
#[derive(Debug)]
pub struct RouteReloader {
    path: PathBuf,
    published: Vec<RouteConfig>,
}

impl RouteReloader {
    pub fn new(path: &Path, current: &GatewayConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            published: current.routes.clone(),
        }
    }

    pub fn reload(&mut self) -> Reload {
        match load_config(&self.path) {
            Ok(config) if config.routes == self.published => Reload::Unchanged,
            Ok(config) => {
                self.published = config.routes.clone();
                Reload::Changed(config)
            }
            Err(e) => Reload::Failed(e),
        }
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    reloader: RouteReloader,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, starting from the routes in `current`.
    ///
    /// Returns the watcher and a receiver for configurations with new routes.
    pub fn new(
        path: &Path,
        current: &GatewayConfig,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                reloader: RouteReloader::new(path, current),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.reloader.path.clone();
        let tx = self.update_tx;
        let mut reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match reloader.reload() {
                        Reload::Changed(config) => {
                            tracing::info!(routes = config.routes.len(), "Config file changed, publishing routes");
                            let _ = tx.send(config);
                        }
                        Reload::Unchanged => {
                            tracing::debug!("Config file touched, routes unchanged");
                        }
                        Reload::Failed(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current routes");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
