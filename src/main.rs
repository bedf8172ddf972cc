//! Staking Gateway
//!
//! Edge gateway in front of the staking web app.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                STAKING GATEWAY               │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│   gate   │──▶│  routing  │  │
//!                     │  │ server  │   │ rewrite  │   │           │  │
//!                     │  └─────────┘   └────┬─────┘   └─────┬─────┘  │
//!                     │                     │               │        │
//!                     │              reputation API    ┌────┴─────┐  │
//!                     │              (proxycheck)      │  pages   │  │
//!                     │                                │ dashboard│──┼──▶ Dashboard
//!                     │                                │ SWR cache│  │    upstream
//!                     │                                └──────────┘  │
//!                     │   config + reload │ logging + metrics │ lifecycle │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use staking_gateway::config::{load_or_default, watcher::ConfigWatcher};
use staking_gateway::http::HttpServer;
use staking_gateway::lifecycle::{signals, Shutdown};
use staking_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "staking-gateway")]
#[command(about = "Edge gateway for the staking app", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!("staking-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        blocked_regions = config.gate.blocked_regions.len(),
        upstream = %config.dashboard.upstream_url,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, shutdown.subscribe())?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
