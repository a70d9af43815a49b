//! End-to-end behaviour of the error middleware: panic recovery,
//! sanitization, correlation and the single-write guarantee.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use postboard_core::logger::{Level, MemorySink};
use postboard_core::middleware::{error_handler, ErrorHandlerConfig, ErrorHandling};
use postboard_core::{AppError, AppResult, ContextKey, Logger, RequestContext, ResponseWriter};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const DEFAULT_MESSAGE: &str = "An error occurred while processing your request";

async fn panics() -> &'static str {
    panic!("kaboom")
}

#[inline(never)]
fn deep_panic_site() -> &'static str {
    panic!("deep failure")
}

async fn panics_deeper() -> &'static str {
    deep_panic_site()
}

async fn missing_user() -> AppResult<Response> {
    Err(AppError::not_found("user").with_details("no user with that id"))
}

async fn exploding_query() -> AppResult<Response> {
    Err(AppError::internal("query planner exploded").with_details("table posts is locked"))
}

async fn fails_for_user(ctx: RequestContext) -> AppResult<Response> {
    ctx.set(ContextKey::UserId, "user-42");
    Err(AppError::internal("ledger write failed"))
}

async fn writes_twice(resp: ResponseWriter) -> Response {
    let first = resp.not_found("post");
    let _ignored = resp.internal_error("second failure");
    first
}

async fn bare_forbidden() -> StatusCode {
    StatusCode::FORBIDDEN
}

async fn echo_request_id(ctx: RequestContext) -> String {
    ctx.request_id().unwrap_or_default()
}

fn app(config: ErrorHandlerConfig) -> (Router, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let handling = ErrorHandling::new(config, Logger::with_sink("test", "0.0.0", sink.clone()));

    let router = Router::new()
        .route("/panic", get(panics))
        .route("/deep", get(panics_deeper))
        .route("/missing", get(missing_user))
        .route("/explode", get(exploding_query))
        .route("/as-user", get(fails_for_user))
        .route("/twice", get(writes_twice))
        .route("/forbidden", get(bare_forbidden))
        .route("/echo", get(echo_request_id))
        .layer(from_fn_with_state(handling, error_handler));
    (router, sink)
}

async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, request_id, bytes.to_vec())
}

fn get_req(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_panic_becomes_sanitized_500() {
    let (router, sink) = app(ErrorHandlerConfig::default());

    let (status, request_id, bytes) = call(&router, get_req("/panic")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(request_id.is_some());

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("INTERNAL_ERROR"));
    assert_eq!(body["error"], json!(DEFAULT_MESSAGE));
    assert!(body.get("context").is_none());

    let panic_logs = sink.find("Panic recovered");
    assert_eq!(panic_logs.len(), 1);
    assert_eq!(panic_logs[0].level, Level::Error);
    assert_eq!(panic_logs[0].field("path"), Some(&json!("/panic")));
    assert_eq!(panic_logs[0].field("method"), Some(&json!("GET")));
    assert_eq!(sink.find("Server error occurred").len(), 1);
}

#[tokio::test]
async fn test_panic_details_when_enabled() {
    let (router, _) = app(ErrorHandlerConfig {
        enable_stack_trace: true,
        enable_detailed_errors: true,
        ..ErrorHandlerConfig::default()
    });

    let (status, _, bytes) = call(&router, get_req("/panic")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!("Internal server error"));
    assert_eq!(body["context"]["panic"], json!(true));
    assert!(body["context"]["stack_trace"].is_string());
}

#[tokio::test]
async fn test_panic_stack_trace_includes_panic_site() {
    let (router, sink) = app(ErrorHandlerConfig {
        enable_stack_trace: true,
        enable_detailed_errors: true,
        ..ErrorHandlerConfig::default()
    });

    let (status, _, bytes) = call(&router, get_req("/deep")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let trace = body["context"]["stack_trace"].as_str().unwrap();
    assert!(trace.contains("deep_panic_site"), "{trace}");

    let logged = &sink.find("Panic recovered")[0];
    let logged_trace = logged.field("stack_trace").and_then(Value::as_str).unwrap();
    assert!(logged_trace.contains("deep_panic_site"));

    let function = logged.source.as_ref().and_then(|s| s.function.as_deref()).unwrap();
    assert!(function.ends_with("panic_error"), "{function}");
}

#[tokio::test]
async fn test_client_error_keeps_detail_and_request_id() {
    let (router, sink) = app(ErrorHandlerConfig::default());
    let req = Request::builder()
        .uri("/missing")
        .header("x-request-id", "abc-123")
        .header("x-trace-id", "trace-9")
        .body(Body::empty())
        .unwrap();

    let (status, request_id, bytes) = call(&router, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(request_id.as_deref(), Some("abc-123"));

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!("user not found"));
    assert_eq!(body["code"], json!("NOT_FOUND"));
    assert_eq!(body["details"], json!("no user with that id"));
    assert_eq!(body["request_id"], json!("abc-123"));

    let logged = &sink.find("Client error occurred")[0];
    assert_eq!(logged.level, Level::Warn);
    assert_eq!(logged.request_id.as_deref(), Some("abc-123"));
    assert_eq!(logged.trace_id.as_deref(), Some("trace-9"));
}

#[tokio::test]
async fn test_server_error_detail_stays_in_logs() {
    let (router, sink) = app(ErrorHandlerConfig::default());

    let (status, _, bytes) = call(&router, get_req("/explode")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!(DEFAULT_MESSAGE));
    assert!(body.get("details").is_none());

    let logged = &sink.find("Server error occurred")[0];
    let error = logged.error_record().unwrap();
    assert_eq!(error.message, "query planner exploded");
    assert_eq!(error.details, "table posts is locked");
    assert!(logged.source.is_some());
}

#[tokio::test]
async fn test_authenticated_user_reaches_logged_error() {
    let (router, sink) = app(ErrorHandlerConfig::default());

    let (status, _, _) = call(&router, get_req("/as-user")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let logged = &sink.find("Server error occurred")[0];
    assert_eq!(logged.user_id.as_deref(), Some("user-42"));
    let error = logged.error_record().unwrap();
    assert_eq!(error.user_id.as_deref(), Some("user-42"));
    assert!(error.request_id.is_some());
}

#[tokio::test]
async fn test_only_first_error_is_written() {
    let (router, sink) = app(ErrorHandlerConfig::default());

    let (status, _, bytes) = call(&router, get_req("/twice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!("post not found"));

    assert_eq!(sink.find("Client error occurred").len(), 1);
    assert!(sink.find("Server error occurred").is_empty());
    assert_eq!(sink.find("Error already written for request").len(), 1);
}

#[tokio::test]
async fn test_bare_status_gets_envelope() {
    let (router, _) = app(ErrorHandlerConfig::default());

    let (status, _, bytes) = call(&router, get_req("/forbidden")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], json!("FORBIDDEN"));
    assert_eq!(body["error"], json!("Forbidden"));
}

#[tokio::test]
async fn test_request_id_is_generated_and_shared() {
    let (router, _) = app(ErrorHandlerConfig::default());

    let (status, request_id, bytes) = call(&router, get_req("/echo")).await;
    assert_eq!(status, StatusCode::OK);

    let request_id = request_id.unwrap();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());
    assert_eq!(String::from_utf8(bytes).unwrap(), request_id);
}

#[tokio::test]
async fn test_unmatched_route_is_enveloped() {
    let (router, _) = app(ErrorHandlerConfig::default());

    let (status, _, bytes) = call(&router, get_req("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], json!("NOT_FOUND"));
    assert_eq!(body["error"], json!("Not Found"));
}
