use super::{parse_id, ApiJson, ApiPath, ApiQuery};
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{CreatePostRequest, PaginationQuery, UpdatePostRequest};
use crate::response::ResponseWriter;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

pub const POSTS_RETRIEVED: &str = "Posts retrieved successfully";
pub const POST_DELETED: &str = "Post deleted successfully";

#[derive(Debug, Serialize)]
struct Deleted {
    id: Uuid,
}

/// Token holders post as themselves. API-key callers name the author in
/// the body.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    resp: ResponseWriter,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> AppResult<Response> {
    let author = match caller.user_id() {
        Some(id) => parse_id(id, "user")?,
        None => req.user_id.ok_or_else(|| {
            AppError::validation("user_id", "user_id is required when authenticating with an API key")
        })?,
    };

    let post = state.posts.create_post(resp.context(), author, req).await?;
    Ok(resp.created(post))
}

pub async fn get_post(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "post")?;
    let post = state.posts.get_post(resp.context(), id).await?;
    Ok(resp.success(post))
}

pub async fn list_posts(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> AppResult<Response> {
    match query.params() {
        Some(params) => {
            let page = state
                .posts
                .list_posts_paginated(resp.context(), &params)
                .await?;
            Ok(resp.json_with_meta(StatusCode::OK, page.data, POSTS_RETRIEVED, page.pagination))
        }
        None => {
            let posts = state.posts.list_posts(resp.context()).await?;
            Ok(resp.success(posts))
        }
    }
}

pub async fn list_posts_by_user(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> AppResult<Response> {
    let user_id = parse_id(&user_id, "user")?;
    match query.params() {
        Some(params) => {
            let page = state
                .posts
                .posts_by_user_paginated(resp.context(), user_id, &params)
                .await?;
            Ok(resp.json_with_meta(StatusCode::OK, page.data, POSTS_RETRIEVED, page.pagination))
        }
        None => {
            let posts = state.posts.posts_by_user(resp.context(), user_id).await?;
            Ok(resp.success(posts))
        }
    }
}

pub async fn update_post(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> AppResult<Response> {
    let id = parse_id(&id, "post")?;
    let post = state.posts.update_post(resp.context(), id, req).await?;
    Ok(resp.success(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "post")?;
    state.posts.delete_post(resp.context(), id).await?;
    Ok(resp.json_with_message(StatusCode::OK, Deleted { id }, POST_DELETED))
}
