//! portfolio-edge
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                  PORTFOLIO EDGE                   │
//!   Request        │  ┌────────────┐   ┌─────────────┐                 │
//!   ───────────────┼─▶│ request id │──▶│ interceptor │──┬─▶ /api/contact ──▶ SMTP relay
//!                  │  │ + tracing  │   │ rate limit  │  │                 │
//!                  │  └────────────┘   │ sec headers │  └─▶ static site   │
//!                  │                   └─────────────┘                    │
//!                  │  config (TOML, hot reload) · metrics · shutdown      │
//!                  └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use portfolio_edge::config::{load_config, ConfigWatcher, EdgeConfig};
use portfolio_edge::lifecycle::{signals::spawn_signal_listener, Shutdown};
use portfolio_edge::observability::{logging, metrics};
use portfolio_edge::EdgeServer;

#[derive(Parser)]
#[command(name = "portfolio-edge")]
#[command(about = "Edge server for the portfolio site", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "PORTFOLIO_EDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Watch the configuration file and apply changes without a restart.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("portfolio-edge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        contact_prefix = %config.interceptor.contact_prefix,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        mail_transport = ?config.mail.transport,
        "Configuration loaded"
    );
    if config.interceptor.test_hooks {
        tracing::warn!("Rate limit test hooks are enabled; do not run this in production");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = EdgeServer::new(config)?;
    server.run(listener, config_updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
