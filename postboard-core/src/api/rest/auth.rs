use super::ApiJson;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    auth::TOKEN_TYPE, validate_request, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};
use crate::response::ResponseWriter;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

pub const REGISTERED_MESSAGE: &str = "User registered successfully";

pub async fn register(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let user = state.users.create_user(resp.context(), req).await?;
    Ok(resp.json_with_message(
        StatusCode::CREATED,
        RegisterResponse {
            user,
            message: REGISTERED_MESSAGE.to_string(),
        },
        REGISTERED_MESSAGE,
    ))
}

pub async fn login(
    State(state): State<AppState>,
    resp: ResponseWriter,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    validate_request(&req)?;
    let user = state
        .users
        .validate_credentials(resp.context(), &req.username, &req.password)
        .await?;

    let issued = state
        .auth
        .generate_token(user.id, &user.username)
        .map_err(|err| AppError::internal("Failed to generate token").with_internal(err))?;

    Ok(resp.json_with_message(
        StatusCode::OK,
        LoginResponse {
            user,
            access_token: issued.token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: issued.expires_in,
        },
        "Login successful",
    ))
}
