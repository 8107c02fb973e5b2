//! # MİDA server
//!
//! Serves widget challenges, runs chapca flows and stores session history.
//!
//! ## Architecture
//! ```text
//! Browser → mida → Redis (sessions, text challenges)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mida::config::{AppConfig, Overrides, StoreBackend};
use mida::routes;
use mida::state::AppState;

const FLOW_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// MİDA trainer server
#[derive(Parser, Debug)]
#[command(name = "mida")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/mida.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Keep sessions in memory instead of Redis
    #[arg(long)]
    memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            redis_url: self.redis_url.clone(),
            listen: self.listen.clone(),
            store: self.memory.then_some(StoreBackend::Memory),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting MİDA v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args.overrides())?;
    info!(store = ?config.store, "Configuration loaded from {}", args.config);

    // Initialize application state
    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config).await?;

    // Sweep abandoned chapca flows in the background
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLOW_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep_idle_flows().await;
        }
    });

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("MİDA listening on {}", listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("MİDA shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
