//! Helpers shared by unit tests that need a fake completion provider.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::Value;

/// Headers and JSON body of every request the fake upstream received.
pub type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

/// Serves `body` with `status` at `/v1/chat/completions` on an ephemeral port.
pub async fn spawn_upstream(status: StatusCode, body: &'static str) -> (String, Captured) {
    let captured: Captured = Arc::default();
    let sink = captured.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(request): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push((headers, request));
                (status, Body::from(body)).into_response()
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/chat/completions"), captured)
}

/// A canned stream: two reasoning chunks, two content chunks, stop, `[DONE]`.
pub const STREAM_FIXTURE: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"Let me \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"think.\"}}]}\n\n",
    ": comment line\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"# Jane Doe\\n\"}}]}\n\n",
    "data: {broken\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Rust engineer\"},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);
