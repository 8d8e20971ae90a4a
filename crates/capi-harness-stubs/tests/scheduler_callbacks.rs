// crates/capi-harness-stubs/tests/scheduler_callbacks.rs
// ============================================================================
// Module: Scheduler Callback Tests
// Description: End-to-end coverage for the callback simulator.
// Purpose: Drive real HTTP round trips through the stub and a receiver.
// Dependencies: capi-harness-stubs, axum, prost, reqwest, tokio
// ============================================================================

//! ## Overview
//! A recording receiver stands in for the target's completion endpoint.
//! Invariants:
//! - `https` callback URLs are dialed over `http`.
//! - Receiver status in `[200, 400)` yields `200`; anything else yields `500`.
//! - Undecodable desires yield `400` and the server keeps serving.
//! - Desires are handled independently; several may be in flight at once.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use capi_harness_core::DesireTaskRequest;
use capi_harness_core::MemoryEventSink;
use capi_harness_core::TaskCallbackRequest;
use capi_harness_core::wire::DESIRE_TASK_PATH;
use capi_harness_core::wire::PROTOBUF_CONTENT_TYPE;
use capi_harness_stubs::CallbackTemplate;
use capi_harness_stubs::IdentityStubOptions;
use capi_harness_stubs::SchedulerStubOptions;
use capi_harness_stubs::spawn_identity_stub;
use capi_harness_stubs::spawn_scheduler_stub;
use prost::Message;
use tokio::sync::Barrier;
use tokio::task::JoinSet;

type Received = Arc<Mutex<Vec<(String, TaskCallbackRequest)>>>;

/// Receiver answering `/callbacks/{guid}` with `status`.
async fn spawn_receiver(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route(
            "/callbacks/{guid}",
            post(
                move |State(received): State<Received>,
                      Path(guid): Path<String>,
                      Json(body): Json<TaskCallbackRequest>| async move {
                    received.lock().unwrap().push((guid, body));
                    status
                },
            ),
        )
        .with_state(Arc::clone(&received));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr.to_string(), received)
}

async fn desire(stub_url: &str, body: Vec<u8>) -> u16 {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .post(format!("{stub_url}{DESIRE_TASK_PATH}"))
        .header("content-type", PROTOBUF_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

#[tokio::test(flavor = "multi_thread")]
async fn desire_is_completed_over_downgraded_url() {
    let (receiver_addr, received) = spawn_receiver(StatusCode::OK).await;
    let sink = Arc::new(MemoryEventSink::new());
    let stub = spawn_scheduler_stub(SchedulerStubOptions {
        sink: sink.clone(),
        ..SchedulerStubOptions::default()
    })
    .unwrap();

    let callback = format!("https://{receiver_addr}/callbacks/t1");
    let status = desire(stub.base_url(), DesireTaskRequest::new("t1", callback).encode_to_vec()).await;
    assert_eq!(status, 200);

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let (path_guid, body) = &received[0];
    assert_eq!(path_guid, "t1");
    assert_eq!(body.task_guid, "t1");
    assert_eq!(body.result.task_guid, "t1");
    assert_eq!(body.result.lifecycle_type, "docker");
    assert!(body.result.process_types.is_empty());

    let events = sink.events_named("task_callback");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].detail_str("stage"), Some("acknowledged"));
    assert_eq!(
        events[0].detail_str("callback_url"),
        Some(format!("http://{receiver_addr}/callbacks/t1").as_str())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn redirect_class_statuses_count_as_success() {
    let (receiver_addr, _) = spawn_receiver(StatusCode::NOT_MODIFIED).await;
    let stub = spawn_scheduler_stub(SchedulerStubOptions::default()).unwrap();
    let callback = format!("http://{receiver_addr}/callbacks/t2");
    let status = desire(stub.base_url(), DesireTaskRequest::new("t2", callback).encode_to_vec()).await;
    assert_eq!(status, 200);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_callback_is_internal_error() {
    let (receiver_addr, received) = spawn_receiver(StatusCode::UNPROCESSABLE_ENTITY).await;
    let stub = spawn_scheduler_stub(SchedulerStubOptions::default()).unwrap();
    let callback = format!("https://{receiver_addr}/callbacks/t3");
    let status = desire(stub.base_url(), DesireTaskRequest::new("t3", callback).encode_to_vec()).await;
    assert_eq!(status, 500);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_callback_is_internal_error() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);
    let stub = spawn_scheduler_stub(SchedulerStubOptions::default()).unwrap();
    let callback = format!("http://{addr}/callbacks/t4");
    let status = desire(stub.base_url(), DesireTaskRequest::new("t4", callback).encode_to_vec()).await;
    assert_eq!(status, 500);
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_payload_does_not_stop_the_server() {
    let (receiver_addr, received) = spawn_receiver(StatusCode::OK).await;
    let stub = spawn_scheduler_stub(SchedulerStubOptions {
        template: CallbackTemplate {
            docker_image: "registry.test/app:1".to_string(),
            ..CallbackTemplate::default()
        },
        ..SchedulerStubOptions::default()
    })
    .unwrap();

    assert_eq!(desire(stub.base_url(), vec![0xff, 0xff, 0xff]).await, 400);
    let missing_url = DesireTaskRequest::new("t5", "").encode_to_vec();
    assert_eq!(desire(stub.base_url(), missing_url).await, 400);

    let callback = format!("http://{receiver_addr}/callbacks/t5");
    let status = desire(stub.base_url(), DesireTaskRequest::new("t5", callback).encode_to_vec()).await;
    assert_eq!(status, 200);
    let received = received.lock().unwrap().clone();
    assert_eq!(received[0].1.result.lifecycle_metadata.docker_image, "registry.test/app:1");
}

#[tokio::test(flavor = "multi_thread")]
async fn identity_stub_advertises_issuer() {
    let stub = spawn_identity_stub(IdentityStubOptions::new("http://localhost:6789")).unwrap();
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let discovery: serde_json::Value = client
        .get(format!("{}/.well-known/openid-configuration", stub.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(discovery["issuer"], "http://localhost:6789");
    assert_eq!(discovery["jwks_uri"], "http://localhost:6789/token_keys");

    let keys: serde_json::Value = client
        .get(format!("{}/token_keys", stub.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(keys["keys"], serde_json::json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_desires_are_in_flight_together() {
    const IN_FLIGHT: usize = 4;
    let barrier = Arc::new(Barrier::new(IN_FLIGHT));
    let received: Received = Arc::default();
    let app = Router::new()
        .route(
            "/callbacks/{guid}",
            post(
                move |State((barrier, received)): State<(Arc<Barrier>, Received)>,
                      Path(guid): Path<String>,
                      Json(body): Json<TaskCallbackRequest>| async move {
                    received.lock().unwrap().push((guid, body));
                    barrier.wait().await;
                    StatusCode::OK
                },
            ),
        )
        .with_state((Arc::clone(&barrier), Arc::clone(&received)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let receiver_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let stub = spawn_scheduler_stub(SchedulerStubOptions::default()).unwrap();
    let mut desires = JoinSet::new();
    for index in 0 .. IN_FLIGHT {
        let stub_url = stub.base_url().to_string();
        let guid = format!("c{index}");
        let callback = format!("https://{receiver_addr}/callbacks/{guid}");
        desires.spawn(async move {
            let body = DesireTaskRequest::new(guid.clone(), callback).encode_to_vec();
            (guid, desire(&stub_url, body).await)
        });
    }
    let statuses = tokio::time::timeout(Duration::from_secs(30), desires.join_all())
        .await
        .expect("desires held behind one another");
    for (guid, status) in &statuses {
        assert_eq!(*status, 200, "desire {guid}");
    }

    let mut guids: Vec<String> = received
        .lock()
        .unwrap()
        .iter()
        .map(|(path_guid, body)| {
            assert_eq!(path_guid, &body.task_guid);
            assert_eq!(body.result.task_guid, body.task_guid);
            body.task_guid.clone()
        })
        .collect();
    guids.sort();
    let expected: Vec<String> = (0 .. IN_FLIGHT).map(|index| format!("c{index}")).collect();
    assert_eq!(guids, expected);
}
