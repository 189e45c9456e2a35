//! custrelay-ingest - Ingestion Service entry point
//!
//! Accepts bulk CSV uploads over HTTP and relays them record-by-record to
//! the update service over a persistent streaming connection.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use custrelay_common::UpdateClient;
use custrelay_ingest::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for custrelay-ingest
#[derive(Parser, Debug)]
#[command(name = "custrelay-ingest")]
#[command(about = "Customer record ingestion service")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:8080",
        env = "CUSTRELAY_INGEST_LISTEN"
    )]
    listen: SocketAddr,

    /// Address of the update service
    #[arg(
        long,
        default_value = "http://127.0.0.1:8090",
        env = "CUSTRELAY_UPDATE_ADDR"
    )]
    update_addr: String,

    /// Per-request ingestion deadline in seconds
    #[arg(long, default_value = "300", env = "CUSTRELAY_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: u64,

    /// Maximum upload size in bytes
    #[arg(
        long,
        default_value = "1073741824",
        env = "CUSTRELAY_MAX_UPLOAD_BYTES"
    )]
    max_upload_bytes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custrelay_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting custrelay ingestion service v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Update service: {}", args.update_addr);

    let client = UpdateClient::connect(args.update_addr)
        .await
        .context("Failed to connect to update service")?;
    info!("Connected to update service");

    let state = AppState::new(
        client,
        Duration::from_secs(args.request_timeout_secs),
        args.max_upload_bytes,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .context("Failed to bind to listen address")?;
    info!("Ingest server listening on http://{}", args.listen);
    info!("Health check: http://{}/health", args.listen);

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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
