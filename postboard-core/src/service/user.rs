use super::timed;
use crate::context::RequestContext;
use crate::error::{AppError, AppResult, ErrorCode};
use crate::logger::Logger;
use crate::models::{
    validate_request, CreateUserRequest, PaginatedResponse, PaginationMeta, PaginationParams, User,
};
use crate::storage::UserRepository;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Hex SHA-256 digest of a password
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    logger: Logger,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, logger: Logger) -> Self {
        Self { users, logger }
    }

    pub async fn create_user(&self, ctx: &RequestContext, req: CreateUserRequest) -> AppResult<User> {
        validate_request(&req)?;

        match self.users.get_by_username(&req.username).await {
            Ok(_) => {
                return Err(AppError::conflict(
                    "user",
                    format!("username '{}' is already taken", req.username),
                ))
            }
            Err(crate::storage::StorageError::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let user = User::new(req.username, hash_password(&req.password));
        timed(&self.logger, ctx, "insert", "users", self.users.create(&user)).await?;

        self.logger.with_context(ctx).info(
            "User created",
            &[
                ("user_id", Value::from(user.id.to_string())),
                ("username", Value::from(user.username.as_str())),
            ],
        );
        Ok(user)
    }

    pub async fn get_user(&self, ctx: &RequestContext, id: Uuid) -> AppResult<User> {
        timed(&self.logger, ctx, "select", "users", self.users.get_by_id(id)).await
    }

    pub async fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> AppResult<User> {
        timed(&self.logger, ctx, "select", "users", self.users.get_by_username(username)).await
    }

    pub async fn list_users(&self, ctx: &RequestContext) -> AppResult<Vec<User>> {
        timed(&self.logger, ctx, "list", "users", self.users.list()).await
    }

    pub async fn list_users_paginated(
        &self,
        ctx: &RequestContext,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<User>> {
        let (data, total) =
            timed(&self.logger, ctx, "list", "users", self.users.list_paginated(params)).await?;
        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(params.page, params.page_size, total),
        })
    }

    /// Look up the user and check the password. Unknown users and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn validate_credentials(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> AppResult<User> {
        let user = match self.get_user_by_username(ctx, username).await {
            Ok(user) => user,
            Err(err) if err.code() == &ErrorCode::NotFound => {
                return Err(AppError::unauthorized(INVALID_CREDENTIALS))
            }
            Err(err) => return Err(err),
        };

        if user.password_hash != hash_password(password) {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }
        Ok(user)
    }
}
