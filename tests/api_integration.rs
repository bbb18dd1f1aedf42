//! HTTP-level tests for the chat endpoints
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; both
//! model backends are scripted.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use context_engine::{
    api::build_app_with,
    config::Config,
    llm::{CapabilityError, ScriptedCapability},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    compactor: Arc<ScriptedCapability>,
    inference: Arc<ScriptedCapability>,
}

fn app_with(compactor: ScriptedCapability, inference: ScriptedCapability) -> TestApp {
    let compactor = Arc::new(compactor);
    let inference = Arc::new(inference);
    let router = build_app_with(&Config::default(), compactor.clone(), inference.clone());
    TestApp {
        router,
        compactor,
        inference,
    }
}

fn app() -> TestApp {
    app_with(
        ScriptedCapability::new("gemini-2.0-flash", "Summary of conversation."),
        ScriptedCapability::new("gemini-2.5-pro", "Forty-two."),
    )
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn long_history() -> Value {
    json!([{"role": "user", "content": "x".repeat(10_000)}])
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "UP", "service": "context-engine"}));
}

#[tokio::test]
async fn test_chat_short_history_is_not_compacted() {
    let app = app();
    let (status, body) = send(
        &app.router,
        post_json(
            "/api/chat",
            json!({"message": "How are you?", "history": [{"role": "user", "content": "Hello"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Forty-two.");
    assert_eq!(body["compacted"], false);
    assert_eq!(body["usage"]["compactorInputTokens"], 0);
    assert_eq!(body["usage"]["compactorOutputTokens"], 0);
    assert_eq!(app.compactor.call_count(), 0);
}

#[tokio::test]
async fn test_chat_long_history_is_compacted() {
    let app = app();
    let (status, body) = send(
        &app.router,
        post_json("/api/chat", json!({"message": "Recap?", "history": long_history()})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["compacted"], true);
    assert_eq!(body["usage"]["compactorInputTokens"], 2500);
    assert_eq!(body["usage"]["compactorOutputTokens"], 6);
    assert_eq!(app.compactor.call_count(), 1);
    assert!(app
        .inference
        .last_prompt()
        .unwrap()
        .contains("Summary of conversation."));
}

#[tokio::test]
async fn test_chat_raw_never_compacts() {
    let app = app();
    let (status, body) = send(
        &app.router,
        post_json("/api/chat-raw", json!({"message": "Recap?", "history": long_history()})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["compacted"], false);
    assert_eq!(body["usage"]["compactorInputTokens"], 0);
    assert_eq!(body["usage"]["compactorOutputTokens"], 0);
    assert!(body["usage"]["inputTokens"].as_u64().unwrap() > 2500);
    assert_eq!(app.compactor.call_count(), 0);
}

#[tokio::test]
async fn test_null_and_missing_history_are_accepted() {
    let app = app();

    let (status, body) = send(
        &app.router,
        post_json("/api/chat", json!({"message": "Hi", "history": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["compacted"], false);

    let (status, _) = send(&app.router, post_json("/api/chat-raw", json!({"message": "Hi"}))).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.inference.prompts(), vec!["Hi", "Hi"]);
}

#[tokio::test]
async fn test_missing_message_is_bad_request() {
    let app = app();
    let (status, body) = send(&app.router, post_json("/api/chat", json!({"history": []}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.inference.call_count(), 0);
}

#[tokio::test]
async fn test_compactor_failure_surfaces_as_gateway_error() {
    let app = app_with(
        ScriptedCapability::failing(
            "gemini-2.0-flash",
            CapabilityError::Upstream { status: 500, body: "boom".into() },
        ),
        ScriptedCapability::new("gemini-2.5-pro", "unused"),
    );

    let (status, body) = send(
        &app.router,
        post_json("/api/chat", json!({"message": "Recap?", "history": long_history()})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert_eq!(app.inference.call_count(), 0);
}

#[tokio::test]
async fn test_inference_timeout_maps_to_gateway_timeout() {
    let app = app_with(
        ScriptedCapability::new("gemini-2.0-flash", "unused"),
        ScriptedCapability::failing("gemini-2.5-pro", CapabilityError::Timeout("60s".into())),
    );

    let (status, body) = send(&app.router, post_json("/api/chat-raw", json!({"message": "Hi"}))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "TIMEOUT");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_chats() {
    let app = app();
    send(&app.router, post_json("/api/chat-raw", json!({"message": "Hi"}))).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat_requests_total"));
}
