//! # Custrelay Common Library
//!
//! Shared code for the custrelay services:
//! - The `Record` data model and protobuf conversions
//! - The update protocol client (`UpdateClient` / `Session`)
//! - Protocol error types

pub mod client;
pub mod error;
pub mod record;

/// Generated protobuf/gRPC types for the update protocol.
pub mod proto {
    tonic::include_proto!("customer.v1");
}

pub use client::{Session, UpdateClient, UpdateOutcome};
pub use error::{Error, Result};
pub use record::Record;
