//! Beamdrop Hub
//!
//! LAN-local file relay: sessions, in-memory buffers, peer fan-out.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hub::config::Config;
use hub::net::{info, Server};
use hub::{janitor, Hub};

/// Beamdrop hub - LAN file relay for ad-hoc device-to-device transfers.
#[derive(Parser, Debug)]
#[command(name = "beamdrop-hub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides (PORT et al.)
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    // Initialize tracing; --verbose wins, RUST_LOG wins over the config file
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.hub.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Beamdrop hub starting...");

    let hub = Hub::new(config);

    // Background reclamation of expired files and empty sessions
    janitor::start(hub.clone());

    let server = Server::bind(hub).await?;
    let addr = server.local_addr()?;
    let lan_url = info::hub_url(info::local_ipv4(), addr.port(), None);
    tracing::info!(%addr, url = %lan_url, "Hub listening");

    server.serve_with_shutdown(wait_for_shutdown_signal()).await?;

    tracing::info!("Hub stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::error!(error = %e, "failed to register SIGTERM handler");
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
    }
}
