//! Caching HTTP/1.0 forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  CACHING PROXY                   │
//!                        │                                                  │
//!   GET http://host/p    │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!  ──────────────────────┼─▶│   net    │──▶│  proxy   │──▶│    http     │   │
//!                        │  │ listener │   │ handler  │   │ request +   │   │
//!                        │  └──────────┘   └────┬─────┘   │ target      │   │
//!                        │                      │         └─────────────┘   │
//!                        │          hit ┌───────▼──────┐                    │
//!  ◀─────────────────────┼──────────────│    cache     │                    │
//!                        │              │ (slot locks) │                    │
//!                        │              └───────▲──────┘                    │
//!                        │                      │ insert        ┌────────┐  │
//!  ◀─────────────────────┼──────── relay ───────┴───────────────│ origin │◀─┼── Origin
//!                        │                                      └────────┘  │   server
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use caching_proxy::config::{load_config, ProxyConfig};
use caching_proxy::lifecycle::{signals, Shutdown};
use caching_proxy::net::Listener;
use caching_proxy::observability::{logging, metrics};
use caching_proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "caching-proxy")]
#[command(about = "Caching HTTP/1.0 forward proxy", long_about = None)]
struct Cli {
    /// Port to listen on; overrides the configured bind port.
    port: Option<u16>,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }

    logging::init(&config.observability.log_filter);
    tracing::info!("caching-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        cache_slots = config.cache.slots,
        max_object_size = config.cache.max_object_size,
        connect_timeout_secs = config.origin.connect_timeout_secs,
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

    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    let server = ProxyServer::new(&config);
    let tracker = server.tracker();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::wait_for_signal().await;
    shutdown.trigger();
    server_task.await?;

    let drain = Duration::from_secs(config.listener.drain_timeout_secs);
    if !tracker.wait_idle(drain).await {
        tracing::warn!(
            remaining = tracker.active_count(),
            "Connections still open after drain timeout"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
