//! Client side of the update protocol
//!
//! [`UpdateClient`] owns the connection to the update service and opens
//! [`Session`]s on it. A session wraps one bidirectional stream and enforces
//! a strict one-request/one-response exchange: `update` sends exactly one
//! request and blocks until the matching response arrives. Records are
//! applied remotely with observable side effects, so speculative pipelining
//! is deliberately not supported — each call must learn the outcome of its
//! own record before the caller decides whether to continue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tonic::{Status, Streaming};

use crate::error::{Error, Result};
use crate::proto;
use crate::proto::updater_client::UpdaterClient;
use crate::record::Record;

/// Per-record outcome of a successful round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The remote store applied the record
    Accepted,
    /// The remote store could not apply the record (soft failure; the
    /// session remains usable and the caller may continue with later records)
    Rejected,
}

/// RPC client for the updater service.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    inner: UpdaterClient<Channel>,
}

impl UpdateClient {
    /// Connect to the update service at `addr` (e.g. `http://127.0.0.1:8090`).
    pub async fn connect(addr: String) -> Result<Self> {
        let channel = Endpoint::from_shared(addr)?.connect().await?;
        Ok(Self {
            inner: UpdaterClient::new(channel),
        })
    }

    /// Begin a new update session with the remote server.
    ///
    /// `cancel` is observed at the start of every [`Session::update`] call;
    /// it is never able to interrupt a send or receive already in flight.
    pub async fn start_session(&mut self, cancel: CancellationToken) -> Result<Session> {
        let (outbound, requests) = mpsc::channel(1);
        let response = self
            .inner
            .update(ReceiverStream::new(requests))
            .await
            .map_err(Error::Transport)?;

        Ok(Session {
            closed: AtomicBool::new(false),
            outbound: Mutex::new(Some(outbound)),
            inbound: response.into_inner(),
            cancel,
        })
    }
}

/// An ongoing update session with the remote server.
///
/// Holds exactly one outstanding request at a time; `update` takes
/// `&mut self`, so overlapping calls are rejected at compile time. The
/// session transitions to its terminal `Closed` state on explicit close, on
/// any transport failure, on an observed cancellation, and on drop — the
/// transition happens at most once no matter how many of those triggers race.
#[derive(Debug)]
pub struct Session {
    closed: AtomicBool,
    outbound: Mutex<Option<mpsc::Sender<proto::UpdateRequest>>>,
    inbound: Streaming<proto::UpdateResponse>,
    cancel: CancellationToken,
}

impl Session {
    /// Send one record and wait for its response.
    ///
    /// Returns the per-record [`UpdateOutcome`] on a successful round trip.
    /// Any transport failure closes the session permanently; there is no
    /// retry and no reconnection.
    pub async fn update(&mut self, record: &Record) -> Result<UpdateOutcome> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        if self.cancel.is_cancelled() {
            self.close();
            return Err(Error::Cancelled);
        }

        let outbound = match self.outbound.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(outbound) = outbound else {
            return Err(Error::SessionClosed);
        };

        if outbound.send(record.clone().into()).await.is_err() {
            self.close();
            return Err(Error::Transport(Status::unavailable(
                "request stream closed",
            )));
        }

        match self.inbound.message().await {
            Ok(Some(response)) => match response.status() {
                proto::UpdateStatus::Ok => Ok(UpdateOutcome::Accepted),
                proto::UpdateStatus::Error => Ok(UpdateOutcome::Rejected),
            },
            Ok(None) => {
                self.close();
                Err(Error::Transport(Status::unavailable(
                    "response stream ended by server",
                )))
            }
            Err(status) => {
                self.close();
                Err(Error::Transport(status))
            }
        }
    }

    /// Whether the session has reached its terminal `Closed` state.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the session.
    ///
    /// Idempotent and safe from any calling context: the atomic swap makes
    /// sure the underlying close-send happens exactly once regardless of how
    /// many call sites trigger it concurrently. Errors from the underlying
    /// close are swallowed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Dropping the sender half-closes the request stream, which the
        // server observes as clean end-of-input.
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
