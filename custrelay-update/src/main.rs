//! custrelay-update - Update Service entry point
//!
//! Hosts the streaming updater service plus the standard gRPC health
//! service on one listener. Each accepted connection drives its own session
//! loop; the in-memory customer store is the only state shared between them.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use custrelay_common::proto::updater_server::UpdaterServer;
use custrelay_update::{MemoryStore, UpdaterService};
use tokio::signal;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for custrelay-update
#[derive(Parser, Debug)]
#[command(name = "custrelay-update")]
#[command(about = "Customer record update service")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:8090",
        env = "CUSTRELAY_UPDATE_LISTEN"
    )]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custrelay_update=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting custrelay update service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = Arc::new(MemoryStore::new());
    let service = UpdaterService::new(store);

    // Health-check capability composed beside the update capability on the
    // same connection.
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<UpdaterServer<UpdaterService<MemoryStore>>>()
        .await;

    info!("Update server listening on {}", args.listen);

    Server::builder()
        .add_service(health_service)
        .add_service(UpdaterServer::new(service))
        .serve_with_shutdown(args.listen, shutdown_signal())
        .await
        .context("Update server failed")?;

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
