//! Error types for the update protocol

use thiserror::Error;

/// Common result type for update protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the update protocol client.
///
/// A record rejected by the remote store is not an error; it is reported as
/// [`crate::UpdateOutcome::Rejected`] because the round trip itself succeeded.
#[derive(Error, Debug)]
pub enum Error {
    /// The connection to the update service could not be established
    #[error("failed to connect to update service: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// Stream send or receive failed; the session is closed and cannot be reused
    #[error("transport failure: {0}")]
    Transport(tonic::Status),

    /// `update` was called on a session that has already been closed
    #[error("session is closed")]
    SessionClosed,

    /// The deadline or cancellation signal fired before the request was sent
    #[error("operation cancelled")]
    Cancelled,
}
