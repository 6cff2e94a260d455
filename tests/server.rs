//! HTTP contract tests: drive the axum router in-process.

mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use support::{service, write_doc, KeywordEmbedder, RecordingBackend};
use tempfile::TempDir;
use tower::ServiceExt;

fn app(docs: &std::path::Path, backend: RecordingBackend) -> Router {
    let svc = service(docs, Arc::new(KeywordEmbedder::new()), Arc::new(backend));
    rag_chat::server::router(Arc::new(svc))
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}

#[tokio::test]
async fn health_reports_models_and_chunks() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::GET,
        "/health",
        Body::empty(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider"], "recording");
    assert_eq!(body["backend_reachable"], true);
    assert_eq!(body["embedding_model"], "keywords");
    assert_eq!(body["embedding_dims"], support::VOCAB.len());
    assert_eq!(body["llm_model"], "recording");
    assert_eq!(body["chunks_indexed"], 0);
}

#[tokio::test]
async fn health_reports_unreachable_backend() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::failing()),
        Method::GET,
        "/health",
        Body::empty(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["backend_reachable"], false);
}

#[tokio::test]
async fn chat_returns_reply_history_and_null_sources() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("Hi!")),
        Method::POST,
        "/chat",
        json_body(json!({"user_id": "kart", "message": "hello"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Hi!");
    assert_eq!(body["sources"], Value::Null);
    assert_eq!(body["outcome"], "replied");
    assert_eq!(
        body["history"],
        json!([
            {"role": "user", "content": "hello"},
            {"role": "assistant", "content": "Hi!"}
        ])
    );
    assert!(body.get("flags").is_none());
}

#[tokio::test]
async fn chat_backend_failure_is_still_200() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::failing()),
        Method::POST,
        "/chat",
        json_body(json!({"user_id": "kart", "message": "hello"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "degraded");
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn chat_reports_flags() {
    let tmp = TempDir::new().unwrap();
    let (_, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::POST,
        "/chat",
        json_body(json!({"user_id": "kart", "message": "mail kart@example.com"})),
    )
    .await;

    assert_eq!(body["flags"], json!(["email"]));
    assert_eq!(body["history"][0]["content"], "mail [EMAIL]");
}

#[tokio::test]
async fn chat_rejects_bad_input() {
    let tmp = TempDir::new().unwrap();

    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::POST,
        "/chat",
        json_body(json!({"user_id": "kart", "message": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::POST,
        "/chat",
        Body::from("{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn chat_rejects_message_longer_than_prompt_budget() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::POST,
        "/chat",
        json_body(json!({"user_id": "kart", "message": "u".repeat(13_000)})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("13000 characters"));
}

#[tokio::test]
async fn reindex_returns_index_shape() {
    let tmp = TempDir::new().unwrap();
    write_doc(tmp.path(), "cv.md", "Computer Systems Engineering degree.");
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::POST,
        "/reindex",
        Body::empty(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["chunks_indexed"], 1);
    assert_eq!(
        body["index"],
        json!({"chunks": 1, "dims": support::VOCAB.len()})
    );
}

#[tokio::test]
async fn clear_memory_for_unknown_user_is_ok() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        app(tmp.path(), RecordingBackend::replying("ok")),
        Method::POST,
        "/memory/ghost/clear",
        Body::empty(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["message"], "memory cleared for ghost");
}

#[tokio::test]
async fn put_document_indexes_allowed_types_only() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    let app = app(&docs, RecordingBackend::replying("ok"));

    let (status, body) = send(
        app.clone(),
        Method::PUT,
        "/documents/photo.png",
        Body::from("binary"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "unsupported_file_type");

    let (status, body) = send(
        app.clone(),
        Method::PUT,
        "/documents/notes.txt",
        Body::from("I enjoy chess."),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chunks_indexed"], 1);
    assert!(docs.join("notes.txt").exists());

    let (_, body) = send(app, Method::GET, "/health", Body::empty()).await;
    assert_eq!(body["chunks_indexed"], 1);
}
