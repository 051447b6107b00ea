//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Bind the listener
//! - Start background tasks (signal handler, config reload)
//! - Serve until a shutdown signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds before background tasks start

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;

use crate::config::watcher::{apply_updates, ConfigWatcher};
use crate::config::{GatewayConfig, Mode};
use crate::http::{GatewayServer, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Run the gateway until SIGINT or SIGTERM.
///
/// With a `config_path`, edits to that file are validated and applied to the
/// running pipeline; `mode_override` is re-applied to each of them.
pub async fn run(
    config: GatewayConfig,
    config_path: Option<&Path>,
    mode_override: Option<Mode>,
    api: Option<Router>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let mut server = GatewayServer::new(config);
    if let Some(api) = api {
        server = server.with_api(api);
    }
    let listener = server.bind().await?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    // Kept alive for the lifetime of the server.
    let _watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(apply_updates(
                server.settings(),
                updates,
                mode_override,
                shutdown.subscribe(),
            ));
            Some(handle)
        }
        None => None,
    };

    server.run(listener, shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
