//! HTTP surface: application state, routing and the server

pub mod rest;
pub mod server;

pub use server::ApiServer;

use crate::error::AppError;
use crate::logger::Logger;
use crate::middleware::{error_handler, request_logging, require_auth, ErrorHandling};
use crate::service::{AuthService, PostService, UserService};
use crate::storage::{PostRepository, UserRepository};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/v1";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub posts: Arc<PostService>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(users: UserService, posts: PostService, auth: AuthService) -> Self {
        Self {
            users: Arc::new(users),
            posts: Arc::new(posts),
            auth: Arc::new(auth),
        }
    }

    /// Wire both services to one store that implements both repositories
    pub fn from_store<S>(store: Arc<S>, auth: AuthService, logger: Logger) -> Self
    where
        S: UserRepository + PostRepository + 'static,
    {
        let users: Arc<dyn UserRepository> = store.clone();
        let posts: Arc<dyn PostRepository> = store;
        Self::new(
            UserService::new(users.clone(), logger.clone()),
            PostService::new(posts, users, logger),
            auth,
        )
    }
}

/// Build the full application router.
///
/// Layers, outermost first: error handling, access log, tracing spans,
/// CORS, request timeout.
pub fn create_router(state: AppState, handling: ErrorHandling, request_timeout: Duration) -> Router {
    let access_logger = handling.logger.clone();

    Router::new()
        .route("/health", get(rest::health::health_check))
        .nest(API_PREFIX, api_routes(&state))
        .fallback(route_not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(handling, error_handler))
                .layer(from_fn_with_state(access_logger, request_logging))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let auth = from_fn_with_state(state.auth.clone(), require_auth);

    Router::new()
        .route("/auth/register", post(rest::auth::register))
        .route("/auth/login", post(rest::auth::login))
        .route(
            "/users",
            post(rest::users::create_user).get(rest::users::list_users),
        )
        .route("/users/:id", get(rest::users::get_user))
        .route("/users/:user_id/posts", get(rest::posts::list_posts_by_user))
        .route(
            "/posts",
            get(rest::posts::list_posts)
                .merge(post(rest::posts::create_post).route_layer(auth.clone())),
        )
        .route(
            "/posts/:id",
            get(rest::posts::get_post)
                .merge(put(rest::posts::update_post).route_layer(auth.clone()))
                .merge(delete(rest::posts::delete_post).route_layer(auth)),
        )
}

async fn route_not_found() -> AppError {
    AppError::not_found("route")
}
