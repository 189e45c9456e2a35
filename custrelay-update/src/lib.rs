//! custrelay-update library - Update Service module
//!
//! Server side of the update protocol: consumes one bidirectional stream per
//! session, applies each record to the customer store and replies with
//! exactly one response per request, in receive order.

pub mod service;
pub mod store;

pub use service::UpdaterService;
pub use store::{CustomerStore, MemoryStore, StoreError};
