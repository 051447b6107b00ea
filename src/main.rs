//! BFF gateway (v1)
//!
//! The single entry point between the browser client and the backend
//! microservices.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     BFF GATEWAY                      │
//!                 │                                                      │
//!  Client ───────▶│ trace → headers → entry → cors → admission → routes │
//!                 │                     │                  │        │    │
//!  Client ◀───────│ ◀────────── envelope + X-Correlation-ID ◀─────┘     │
//!                 │                                        │             │
//!                 │                              token buckets (sweeper) │
//!                 │                                                      │
//!                 │  config (TOML, hot reload) · logging · metrics       │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use bff_gateway::config::{load_config, GatewayConfig, Mode};
use bff_gateway::lifecycle;
use bff_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "bff-gateway")]
#[command(about = "Backend-for-frontend gateway", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes while running.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured mode (production | development).
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }

    if cli.check {
        println!("configuration ok");
        return Ok(());
    }

    init_logging(&config.observability, config.mode);

    tracing::info!("bff-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.mode,
        admission_enabled = config.admission.enabled,
        capacity = config.admission.default_policy.capacity,
        refill_per_second = config.admission.default_policy.refill_per_second,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    lifecycle::run(config, cli.config.as_deref(), cli.mode, None).await?;
    Ok(())
}
