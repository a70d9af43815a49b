//! Bearer authentication for mutating endpoints

use crate::context::{ContextKey, RequestContext};
use crate::error::AppError;
use crate::service::AuthService;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

pub const MISSING_HEADER: &str = "Authorization header required";
pub const BAD_SCHEME: &str = "Invalid authorization format. Use 'Bearer <token>'";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Identity established by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatedUser {
    /// Holder of a valid JWT
    User { id: String, username: String },
    /// Holder of the static API key; carries no user identity
    ApiKey,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthenticatedUser::User { id, .. } => Some(id),
            AuthenticatedUser::ApiKey => None,
        }
    }
}

/// Accept `Authorization: Bearer <jwt>` or `Authorization: Bearer <api key>`.
///
/// JWT callers have their user id and username recorded in the request
/// context so later error reports and logs carry them.
pub async fn require_auth(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthorized(MISSING_HEADER))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized(BAD_SCHEME))?
        .trim();

    let user = match auth.validate_token(token) {
        Ok(claims) => AuthenticatedUser::User {
            id: claims.user_id.to_string(),
            username: claims.username,
        },
        Err(_) if auth.matches_api_key(token) => AuthenticatedUser::ApiKey,
        Err(err) => {
            return Err(AppError::unauthorized(INVALID_TOKEN)
                .with_context("reason", err.to_string()))
        }
    };

    if let AuthenticatedUser::User { id, username } = &user {
        let ctx = req
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();
        ctx.set(ContextKey::UserId, id.as_str());
        ctx.set(ContextKey::Username, username.as_str());
        req.extensions_mut().insert(ctx);
    }
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
