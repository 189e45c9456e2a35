//! CSV upload handler
//!
//! Buffers the upload to a temp file first: the pipeline wants seekable,
//! durable input, and a slow uploader must not hold an update session open.
//! Only once the payload is fully on disk does the handler open a session
//! and drive the pipeline.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::pipeline;

/// POST|PUT /ingest
///
/// Accepts a CSV payload and relays every record through one update
/// session. The response is a binary status: 200 when the whole batch went
/// through (rejected records included — they are soft failures), an opaque
/// error status otherwise. No partial-success detail is reported.
pub async fn ingest_upload(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<StatusCode> {
    let file = buffer_upload(request.into_body(), state.max_upload_bytes).await?;

    // Deadline for the whole ingestion, honored at row boundaries only; an
    // in-flight round trip is never interrupted.
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    let timeout = state.request_timeout;
    tokio::spawn(async move {
        tokio::select! {
            _ = watcher.cancelled() => {}
            _ = tokio::time::sleep(timeout) => watcher.cancel(),
        }
    });

    let mut client = state.client.clone();
    let session = client.start_session(cancel.clone()).await;
    let mut session = match session {
        Ok(session) => session,
        Err(err) => {
            error!(error = %err, "failed to start update session");
            cancel.cancel();
            return Err(err.into());
        }
    };

    let result = pipeline::ingest(file.into_std().await, &mut session, &cancel).await;

    // The session is scoped to this request on every exit path.
    session.close();
    cancel.cancel();

    match result {
        Ok(summary) => {
            info!(
                accepted = summary.accepted,
                rejected = summary.rejected,
                "ingestion complete"
            );
            Ok(StatusCode::OK)
        }
        Err(err) => {
            error!(error = %err, "ingestion failed");
            Err(err.into())
        }
    }
}

/// Stream the request body into an unlinked temp file, enforcing the upload
/// size limit, then sync and rewind it for reading.
async fn buffer_upload(body: Body, max_upload_bytes: u64) -> ApiResult<File> {
    let mut file = File::from_std(tempfile::tempfile()?);
    let mut stream = body.into_data_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|err| ApiError::BadRequest(format!("failed to read body: {err}")))?;
        written += chunk.len() as u64;
        if written > max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "upload exceeds {max_upload_bytes} bytes"
            )));
        }
        file.write_all(&chunk).await?;
    }

    file.sync_all().await?;
    file.rewind().await?;
    Ok(file)
}
