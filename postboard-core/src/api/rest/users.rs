use super::{parse_id, ApiJson, ApiPath, ApiQuery};
use crate::api::AppState;
use crate::error::AppResult;
use crate::models::{CreateUserRequest, PaginationQuery, User};
use crate::response::ResponseWriter;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

pub const USERS_RETRIEVED: &str = "Users retrieved successfully";

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub count: usize,
}

pub async fn create_user(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> AppResult<Response> {
    let user = state.users.create_user(resp.context(), req).await?;
    Ok(resp.created(user))
}

pub async fn get_user(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "user")?;
    let user = state.users.get_user(resp.context(), id).await?;
    Ok(resp.success(user))
}

/// Paginated when `page` or `page_size` is given, otherwise everything
pub async fn list_users(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> AppResult<Response> {
    match query.params() {
        Some(params) => {
            let page = state
                .users
                .list_users_paginated(resp.context(), &params)
                .await?;
            Ok(resp.json_with_meta(StatusCode::OK, page.data, USERS_RETRIEVED, page.pagination))
        }
        None => {
            let users = state.users.list_users(resp.context()).await?;
            let count = users.len();
            Ok(resp.success(UserList { users, count }))
        }
    }
}
