//! Configuration file watcher for hot reload.
//!
//! Editors often replace a file instead of writing it in place, so the
//! parent directory is watched and events are filtered down to the config
//! file itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::{GatewayConfig, Mode};
use crate::config::runtime::RuntimeSettings;

/// Monitors the configuration file and emits validated configurations.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !(touches_config && (event.kind.is_modify() || event.kind.is_create())) {
                        return;
                    }

                    tracing::info!(path = %path.display(), "Config file change detected, reloading");
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current settings");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Apply reloaded configurations to the live runtime settings until shutdown.
///
/// A `mode_override` (from the command line) wins over the file's mode on
/// every reload, as it did at startup.
pub async fn apply_updates(
    settings: RuntimeSettings,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mode_override: Option<Mode>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(mut config) => {
                    if let Some(mode) = mode_override {
                        config.mode = mode;
                    }
                    tracing::info!(
                        mode = ?config.mode,
                        classes = config.admission.classes.len(),
                        "Applying reloaded configuration"
                    );
                    settings.replace(&config);
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config update task exiting");
}
