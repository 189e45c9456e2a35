//! Server-side stream handler for the update protocol
//!
//! One [`drive_session`] loop runs per accepted connection. It pulls
//! requests off the stream in order, applies each to the store and pushes
//! back exactly one response per request. A storage failure is isolated to
//! its record: the response carries ERROR and the loop continues. Transport
//! failures in either direction abort the whole session.

use std::sync::Arc;

use custrelay_common::{proto, Record};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{error, info, warn};

use crate::store::CustomerStore;

/// gRPC updater service backed by a [`CustomerStore`].
#[derive(Debug)]
pub struct UpdaterService<S> {
    store: Arc<S>,
}

impl<S> UpdaterService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl<S> proto::updater_server::Updater for UpdaterService<S>
where
    S: CustomerStore + 'static,
{
    type UpdateStream = ReceiverStream<Result<proto::UpdateResponse, Status>>;

    async fn update(
        &self,
        request: Request<Streaming<proto::UpdateRequest>>,
    ) -> Result<Response<Self::UpdateStream>, Status> {
        let requests = request.into_inner();
        let (responses, outbound) = mpsc::channel(1);
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            if let Err(status) = drive_session(store.as_ref(), requests, &responses).await {
                let _ = responses.send(Err(status)).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(outbound)))
    }
}

/// Consume one session's request stream to completion.
///
/// Clean end-of-input stops the loop and reports success with the number of
/// records processed. Any other receive failure, and any failure to send a
/// response back, aborts the session. There is no retry or backoff around
/// the storage call.
pub async fn drive_session<S>(
    store: &S,
    mut requests: impl Stream<Item = Result<proto::UpdateRequest, Status>> + Unpin,
    responses: &mpsc::Sender<Result<proto::UpdateResponse, Status>>,
) -> Result<(), Status>
where
    S: CustomerStore + ?Sized,
{
    let mut record_count: u64 = 0;

    loop {
        let request = match requests.next().await {
            None => {
                info!(record_count, "update stream finished");
                return Ok(());
            }
            Some(Err(status)) => {
                error!(record_count, error = %status, "failed to receive from update stream");
                return Err(status);
            }
            Some(Ok(request)) => request,
        };

        let id = request.id;
        let mut status = proto::UpdateStatus::Ok;

        if let Err(err) = store.upsert(Record::from(request)).await {
            warn!(id, error = %err, "failed to apply record");
            status = proto::UpdateStatus::Error;
        }

        record_count += 1;

        let response = proto::UpdateResponse {
            id,
            status: status.into(),
        };
        if responses.send(Ok(response)).await.is_err() {
            error!(record_count, "failed to send response back to client");
            return Err(Status::aborted("response stream closed"));
        }
    }
}
