//! API gateway for the scheduling services.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                 API GATEWAY                   │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│ routing  │──▶│  request  │  │
//!                     │  │ server  │   │  table   │   │ (buffered │  │
//!                     │  └─────────┘   └──────────┘   │ /streamed)│  │
//!                     │                               └─────┬─────┘  │
//!                     │                                     ▼        │
//!   Client Response   │  ┌─────────┐                 ┌───────────┐  │     users
//!   ◀─────────────────┼──│response │◀────────────────│  hyper    │◀─┼──── appointments
//!                     │  │ relay   │                 │  client   │  │     storage ...
//!                     │  └─────────┘                 └───────────┘  │
//!                     └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_gateway::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use api_gateway::lifecycle::{signals, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Forwards /<service>/... requests to the scheduling backends", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the route table when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);

    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        upstream_timeout_secs = config.timeouts.upstream_secs,
        max_buffered_body_bytes = config.limits.max_buffered_body_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher stops when dropped, so keep it for the life of main.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => result??,
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            server_task.await??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
