//! rues-resolver - registry identity webhook service
//!
//! Resolves company identity from a tax identifier and writes it back to Odoo.
//! Configuration comes from a TOML file, `.env` and environment variables;
//! command-line flags override both.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rues_common::config::{load_dotenv, TomlConfig};
use tokio::signal;
use tracing::info;

use rues_resolver::logging::{apply_configured_level, init_tracing};
use rues_resolver::AppState;

/// Command-line arguments for rues-resolver
#[derive(Parser, Debug)]
#[command(name = "rues-resolver")]
#[command(about = "Company registry identity resolver with Odoo write-back")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "RUES_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_filter = init_tracing();

    load_dotenv();
    let args = Args::parse();

    let mut config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    apply_configured_level(&log_filter, &config.logging.level);

    info!(
        "Starting rues-resolver v{} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    info!("Dataset: {}", config.sources.dataset_url);
    info!("Registry API: {}", config.sources.registry_detail_url);
    info!("Registry web: {}", config.sources.registry_web_base);

    let state = AppState::from_config(&config).context("Failed to initialize service")?;
    let app = rues_resolver::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
