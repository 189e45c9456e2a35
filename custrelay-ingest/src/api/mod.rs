//! HTTP API for the ingestion service

pub mod health;
pub mod upload;

use std::time::Duration;

use axum::routing::post;
use axum::Router;
use custrelay_common::UpdateClient;
use tower_http::trace::TraceLayer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Client connection to the update service
    pub client: UpdateClient,
    /// Deadline applied to each upload request
    pub request_timeout: Duration,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(client: UpdateClient, request_timeout: Duration, max_upload_bytes: u64) -> Self {
        Self {
            client,
            request_timeout,
            max_upload_bytes,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/ingest",
            post(upload::ingest_upload).put(upload::ingest_upload),
        )
        .merge(health::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
