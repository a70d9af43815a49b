//! Drives the full router over an in-memory store

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use postboard_core::api::{create_router, AppState};
use postboard_core::logger::MemorySink;
use postboard_core::middleware::{ErrorHandlerConfig, ErrorHandling};
use postboard_core::service::AuthService;
use postboard_core::storage::MemoryStore;
use postboard_core::Logger;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const API_KEY: &str = "integration-test-key";

struct TestApp {
    router: Router,
    sink: Arc<MemorySink>,
}

impl TestApp {
    fn new() -> Self {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::with_sink("postboard-test", "0.0.0", sink.clone());
        let state = AppState::from_store(
            Arc::new(MemoryStore::new()),
            AuthService::new(API_KEY),
            logger.clone(),
        );
        let handling = ErrorHandling::new(ErrorHandlerConfig::default(), logger);
        Self {
            router: create_router(state, handling, Duration::from_secs(30)),
            sink,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        auth: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    async fn register(&self, username: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({"username": username, "password": "secret123"})),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["user"].clone()
    }

    async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({"username": username, "password": "secret123"})),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        format!("Bearer {}", body["data"]["access_token"].as_str().unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("healthy"));
}

#[tokio::test]
async fn test_register_login_and_post() {
    let app = TestApp::new();
    let user = app.register("alice").await;
    assert!(user.get("password_hash").is_none());

    let token = app.login("alice").await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            Some(json!({"title": "Hello", "content": "First post"})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], json!("Resource created successfully"));
    assert_eq!(body["data"]["user_id"], user["id"]);

    let post_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = app.get(&format!("/api/v1/posts/{post_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], json!("Hello"));
}

#[tokio::test]
async fn test_wrong_password() {
    let app = TestApp::new();
    app.register("bob").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({"username": "bob", "password": "wrong-password"})),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid username or password"));
    assert_eq!(body["code"], json!("UNAUTHORIZED"));
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let app = TestApp::new();
    let post = Some(json!({"title": "t", "content": "c"}));

    let cases = [
        (None, "Authorization header required"),
        (Some("Basic abc"), "Invalid authorization format. Use 'Bearer <token>'"),
        (Some("Bearer not-a-token"), "Invalid or expired token"),
    ];
    for (auth, message) in cases {
        let (status, body) = app
            .send(Method::POST, "/api/v1/posts", post.clone(), auth)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], json!(message));
        assert_eq!(body["code"], json!("UNAUTHORIZED"));
        assert!(body["request_id"].is_string());
    }

    // Reads stay public
    let (status, _) = app.get("/api/v1/posts").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_key_callers_name_the_author() {
    let app = TestApp::new();
    let user = app.register("carol").await;
    let api_key = format!("Bearer {API_KEY}");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            Some(json!({"title": "t", "content": "c"})),
            Some(&api_key),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    assert_eq!(body["context"]["field"], json!("user_id"));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            Some(json!({"title": "t", "content": "c", "user_id": user["id"]})),
            Some(&api_key),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["user_id"], user["id"]);
}

#[tokio::test]
async fn test_user_errors() {
    let app = TestApp::new();
    app.register("dave").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({"username": "dave", "password": "secret123"})),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("user already exists"));

    let (status, body) = app.get("/api/v1/users/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid identifier"));

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app.get(&format!("/api/v1/users/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("user not found"));
    assert_eq!(body["code"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn test_validation_and_bad_body() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({"username": "x", "password": "123"})),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    assert_eq!(body["error"], json!("Multiple validation errors"));
    assert_eq!(body["context"]["validation_errors"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({"username": "robert'); drop table users;--", "password": "secret123"})),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!("Invalid request body"));
}

#[tokio::test]
async fn test_listing_and_pagination() {
    let app = TestApp::new();
    for name in ["erin", "frank", "grace"] {
        app.register(name).await;
    }

    let (status, body) = app.get("/api/v1/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], json!(3));
    assert!(body.get("meta").is_none());

    let (status, body) = app.get("/api/v1/users?page=2&page_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Users retrieved successfully"));
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total"], json!(3));
    assert_eq!(body["meta"]["total_pages"], json!(2));
    assert_eq!(body["meta"]["has_next"], json!(false));
    assert_eq!(body["meta"]["has_previous"], json!(true));
}

#[tokio::test]
async fn test_posts_by_user_update_and_delete() {
    let app = TestApp::new();
    let user = app.register("heidi").await;
    let token = app.login("heidi").await;
    let user_id = user["id"].as_str().unwrap();

    for title in ["one", "two"] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/posts",
                Some(json!({"title": title, "content": "body"})),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get(&format!("/api/v1/users/{user_id}/posts")).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["data"].as_array().unwrap().clone();
    assert_eq!(posts.len(), 2);

    let (_, body) = app
        .get(&format!("/api/v1/users/{user_id}/posts?page_size=1"))
        .await;
    assert_eq!(body["meta"]["total"], json!(2));

    let post_id = posts[0]["id"].as_str().unwrap();
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/posts/{post_id}"),
            Some(json!({"title": "renamed"})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["title"], json!("renamed"));

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/v1/posts/{post_id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Post deleted successfully"));

    let (status, _) = app.get(&format!("/api/v1/posts/{post_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app.get(&format!("/api/v1/users/{missing}/posts")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("user not found"));
}

#[tokio::test]
async fn test_errors_carry_authenticated_user() {
    let app = TestApp::new();
    let user = app.register("ivan").await;
    let token = app.login("ivan").await;
    let user_id = user["id"].as_str().unwrap();

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/posts/{missing}"),
            Some(json!({"title": "renamed"})),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let logged = &app.sink.find("Client error occurred")[0];
    assert_eq!(logged.user_id.as_deref(), Some(user_id));
    assert_eq!(logged.request_id.as_deref(), body["request_id"].as_str());

    let access = &app.sink.find(&format!("HTTP PUT /api/v1/posts/{missing}"))[0];
    assert_eq!(access.user_id.as_deref(), Some(user_id));
    assert_eq!(access.error_record().unwrap().code, "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_route_and_access_log() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v1/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("route not found"));

    app.get("/health").await;
    let access = app.sink.find("HTTP GET /health");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].status_code, Some(200));
    assert!(access[0].request_id.is_some());
    let missed = &app.sink.find("HTTP GET /api/v1/nothing-here")[0];
    assert_eq!(missed.status_code, Some(404));
    assert_eq!(missed.error_record().unwrap().message, "route not found");
    assert!(access[0].error.is_none());
}
