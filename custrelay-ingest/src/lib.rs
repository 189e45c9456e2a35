//! custrelay-ingest library - Ingestion Service module
//!
//! Accepts bulk CSV uploads over HTTP, normalizes each row into a customer
//! record and relays the records one at a time through an update session.
//! Per-record rejections are tolerated; parse, transport and cancellation
//! failures abort the batch.

pub mod api;
pub mod error;
pub mod pipeline;

pub use api::{build_router, AppState};
pub use error::{ApiError, IngestError};
