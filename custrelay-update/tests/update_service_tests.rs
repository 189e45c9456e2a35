//! Integration tests for the update service
//!
//! Runs the real tonic server on an ephemeral port and exercises it through
//! the client-side session from custrelay-common, covering:
//! - last-write-wins semantics for records sharing an email
//! - session close semantics (update after close, idempotent close)
//! - transport failure when the server ends the stream without answering
//! - cancellation observed before a send

use std::sync::Arc;

use custrelay_common::proto::updater_server::UpdaterServer;
use custrelay_common::{Error, Record, UpdateClient, UpdateOutcome};
use custrelay_update::{CustomerStore, MemoryStore, UpdaterService};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

/// Start an in-process update server, composed with the health service the
/// same way the binary composes it, and return its address.
async fn start_server(store: Arc<MemoryStore>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind ephemeral port");
    let addr = listener.local_addr().expect("listener addr");

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<UpdaterServer<UpdaterService<MemoryStore>>>()
        .await;

    tokio::spawn(async move {
        Server::builder()
            .add_service(health_service)
            .add_service(UpdaterServer::new(UpdaterService::new(store)))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("update server should run");
    });

    format!("http://{addr}")
}

/// Updater that ends its response stream without answering any request.
struct SilentUpdater;

#[tonic::async_trait]
impl custrelay_common::proto::updater_server::Updater for SilentUpdater {
    type UpdateStream =
        tokio_stream::wrappers::ReceiverStream<Result<custrelay_common::proto::UpdateResponse, tonic::Status>>;

    async fn update(
        &self,
        _request: tonic::Request<tonic::Streaming<custrelay_common::proto::UpdateRequest>>,
    ) -> Result<tonic::Response<Self::UpdateStream>, tonic::Status> {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(tx);
        Ok(tonic::Response::new(
            tokio_stream::wrappers::ReceiverStream::new(rx),
        ))
    }
}

/// Start a server whose response stream ends before any response is sent.
async fn start_silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind ephemeral port");
    let addr = listener.local_addr().expect("listener addr");

    tokio::spawn(async move {
        Server::builder()
            .add_service(custrelay_common::proto::updater_server::UpdaterServer::new(
                SilentUpdater,
            ))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("silent server should run");
    });

    format!("http://{addr}")
}

fn record(id: i64, name: &str, email: &str, mobile: &str) -> Record {
    Record {
        id,
        name: name.to_string(),
        email: email.to_string(),
        mobile_number: mobile.to_string(),
    }
}

#[tokio::test]
async fn records_sharing_an_email_collapse_to_the_last_write() {
    let store = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store)).await;

    let mut client = UpdateClient::connect(addr).await.expect("connect");
    let mut session = client
        .start_session(CancellationToken::new())
        .await
        .expect("start session");

    let records = [
        record(1, "Alice", "alice@example.com", "08002345678"),
        record(2, "Alice Smith", "alice@example.com", "08002348765"),
        record(3, "Bob", "bob@example.com", "07878787878"),
        record(4, "Bobby", "bob@example.com", "07989898989"),
    ];
    for rec in &records {
        let outcome = session.update(rec).await.expect("update should succeed");
        assert_eq!(outcome, UpdateOutcome::Accepted);
    }

    session.close();

    let stored = store.list().await.expect("list");
    assert_eq!(stored.len(), 2);
    // list is sorted by email: alice@… then bob@…, each holding the last
    // record sent for that email.
    assert_eq!(stored[0].name, "Alice Smith");
    assert_eq!(stored[0].id, 2);
    assert_eq!(stored[1].name, "Bobby");
    assert_eq!(stored[1].id, 4);
}

#[tokio::test]
async fn update_after_close_fails_with_session_closed() {
    let store = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store)).await;

    let mut client = UpdateClient::connect(addr).await.expect("connect");
    let mut session = client
        .start_session(CancellationToken::new())
        .await
        .expect("start session");

    session
        .update(&record(1, "Alice", "alice@example.com", "08002345678"))
        .await
        .expect("update before close should succeed");

    session.close();
    // Closing again is a no-op.
    session.close();

    let err = session
        .update(&record(2, "Bob", "bob@example.com", "07878787878"))
        .await
        .expect_err("update after close must fail");
    assert!(matches!(err, Error::SessionClosed));

    // The record exchanged before the close was still applied.
    assert_eq!(store.list().await.expect("list").len(), 1);
}

#[tokio::test]
async fn health_check_is_answered_independently_of_sessions() {
    use tonic_health::pb::health_check_response::ServingStatus;
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    let store = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store)).await;

    // Leave an update session open while probing health.
    let mut client = UpdateClient::connect(addr.clone()).await.expect("connect");
    let mut session = client
        .start_session(CancellationToken::new())
        .await
        .expect("start session");
    session
        .update(&record(1, "Alice", "alice@example.com", "08002345678"))
        .await
        .expect("update");

    let channel = tonic::transport::Endpoint::from_shared(addr)
        .expect("endpoint")
        .connect()
        .await
        .expect("health channel");
    let mut health = HealthClient::new(channel);

    let response = health
        .check(HealthCheckRequest {
            service: "customer.v1.Updater".to_string(),
        })
        .await
        .expect("health check")
        .into_inner();
    assert_eq!(response.status(), ServingStatus::Serving);
}

#[tokio::test]
async fn server_ending_the_stream_unanswered_closes_the_session() {
    let addr = start_silent_server().await;

    let mut client = UpdateClient::connect(addr).await.expect("connect");
    let mut session = client
        .start_session(CancellationToken::new())
        .await
        .expect("start session");

    let err = session
        .update(&record(1, "Alice", "alice@example.com", "08002345678"))
        .await
        .expect_err("unanswered update must fail");
    assert!(matches!(err, Error::Transport(_)));
    assert!(session.is_closed());

    // The failed session is unusable afterwards.
    let err = session
        .update(&record(2, "Bob", "bob@example.com", "07878787878"))
        .await
        .expect_err("session must stay closed");
    assert!(matches!(err, Error::SessionClosed));
}

#[tokio::test]
async fn cancellation_before_send_closes_the_session() {
    let store = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store)).await;

    let cancel = CancellationToken::new();
    let mut client = UpdateClient::connect(addr).await.expect("connect");
    let mut session = client
        .start_session(cancel.clone())
        .await
        .expect("start session");

    cancel.cancel();

    let err = session
        .update(&record(1, "Alice", "alice@example.com", "08002345678"))
        .await
        .expect_err("cancelled update must fail");
    assert!(matches!(err, Error::Cancelled));
    assert!(session.is_closed());

    // The session is unusable afterwards.
    let err = session
        .update(&record(2, "Bob", "bob@example.com", "07878787878"))
        .await
        .expect_err("session must stay closed");
    assert!(matches!(err, Error::SessionClosed));

    assert!(store.list().await.expect("list").is_empty());
}
