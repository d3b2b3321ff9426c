use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use shared::fetch::{AssetFetcher, FetchError, HttpAssetFetcher};
use shared::inference::{
    CompletionServerEngine, Fragment, InferenceEngine, InferenceError, InferenceOptions,
};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use url::Url;

#[derive(Debug, Clone)]
struct TestServerState {
    stream_body: Arc<String>,
    seen_requests: Arc<Mutex<Vec<Value>>>,
}

impl TestServerState {
    fn streaming(body: &str) -> Self {
        Self {
            stream_body: Arc::new(body.to_string()),
            seen_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn fetcher_returns_asset_bytes() {
    let (base_url, shutdown_tx, server_task) =
        spawn_test_server(TestServerState::streaming("")).await;
    let fetcher = HttpAssetFetcher::new(None).expect("fetcher should build");
    let url = base_url
        .join("models/gemma.bin")
        .expect("asset url should join");

    let bytes = fetcher.fetch(&url).await.expect("asset should download");

    assert_eq!(bytes, b"weights-v1");

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

#[tokio::test]
async fn fetcher_reports_error_status() {
    let (base_url, shutdown_tx, server_task) =
        spawn_test_server(TestServerState::streaming("")).await;
    let fetcher = HttpAssetFetcher::new(None).expect("fetcher should build");
    let url = base_url
        .join("models/missing.bin")
        .expect("asset url should join");

    let err = fetcher
        .fetch(&url)
        .await
        .expect_err("missing asset should fail");

    match err {
        FetchError::Status { url, status } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/models/missing.bin"));
        }
        other => panic!("expected status error, got {other:?}"),
    }

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

#[tokio::test]
async fn fetcher_reports_unreachable_host() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("address should resolve");
    drop(listener);

    let fetcher = HttpAssetFetcher::new(None).expect("fetcher should build");
    let url = Url::parse(&format!("http://{addr}/gemma.bin")).expect("url should parse");

    let err = fetcher
        .fetch(&url)
        .await
        .expect_err("closed port should fail");

    assert!(matches!(err, FetchError::Unreachable { .. }));
    assert!(err.to_string().contains("127.0.0.1"));
}

#[tokio::test]
async fn completion_engine_streams_fragments_until_stop() {
    let state = TestServerState::streaming(concat!(
        "data: {\"content\":\"```json\",\"stop\":false}\n\n",
        "data: {\"content\":\" {}\",\"stop\":false}\n\n",
        "data: {\"content\":\"\",\"stop\":true}\n\n",
    ));
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;
    let engine = CompletionServerEngine::new(
        base_url.join("completion").expect("completion url should join"),
        InferenceOptions::default(),
    )
    .expect("engine should build");

    let mut stream = engine.generate("<start_of_turn>user\nhi<end_of_turn>\n".to_string());
    let mut fragments = Vec::new();
    while let Some(fragment) = stream.next().await {
        fragments.push(fragment.expect("fragment should decode"));
    }

    assert_eq!(
        fragments,
        vec![
            Fragment::partial("```json"),
            Fragment::partial(" {}"),
            Fragment::last(""),
        ]
    );

    let requests = state.seen_requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0]["prompt"],
        "<start_of_turn>user\nhi<end_of_turn>\n"
    );
    assert_eq!(requests[0]["n_predict"], 8000);
    assert_eq!(requests[0]["top_k"], 1);
    assert_eq!(requests[0]["seed"], 64);
    assert_eq!(requests[0]["stream"], true);
    drop(requests);

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

#[tokio::test]
async fn completion_engine_reports_truncated_stream() {
    let state = TestServerState::streaming("data: {\"content\":\"partial\",\"stop\":false}\n\n");
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state).await;
    let engine = CompletionServerEngine::new(
        base_url.join("completion").expect("completion url should join"),
        InferenceOptions::default(),
    )
    .expect("engine should build");

    let mut stream = engine.generate("prompt".to_string());

    let first = stream
        .next()
        .await
        .expect("first fragment should arrive")
        .expect("first fragment should decode");
    assert_eq!(first, Fragment::partial("partial"));

    let second = stream.next().await.expect("stream error should arrive");
    assert!(matches!(second, Err(InferenceError::StreamClosed)));

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

#[tokio::test]
async fn completion_engine_reports_server_status() {
    let (base_url, shutdown_tx, server_task) =
        spawn_test_server(TestServerState::streaming("")).await;
    let engine = CompletionServerEngine::new(
        base_url.join("overloaded").expect("url should join"),
        InferenceOptions::default(),
    )
    .expect("engine should build");

    let mut stream = engine.generate("prompt".to_string());
    let result = stream.next().await.expect("status error should arrive");

    assert!(matches!(result, Err(InferenceError::Status(503))));

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

async fn spawn_test_server(
    state: TestServerState,
) -> (Url, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/models/gemma.bin", get(test_asset_handler))
        .route("/completion", post(test_completion_handler))
        .route("/overloaded", post(test_overloaded_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (
        Url::parse(&format!("http://{local_addr}/")).expect("base url should parse"),
        shutdown_tx,
        server_task,
    )
}

async fn test_asset_handler() -> Vec<u8> {
    b"weights-v1".to_vec()
}

async fn test_completion_handler(
    State(state): State<TestServerState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    state.seen_requests.lock().await.push(payload);
    (
        [(CONTENT_TYPE, "text/event-stream")],
        state.stream_body.as_str().to_string(),
    )
}

async fn test_overloaded_handler() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}
