//! Domain entities and request/response DTOs

pub mod auth;
pub mod pagination;
pub mod post;
pub mod user;

pub use auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
pub use pagination::{PaginatedResponse, PaginationMeta, PaginationParams, PaginationQuery};
pub use post::{CreatePostRequest, Post, UpdatePostRequest};
pub use user::{CreateUserRequest, UpdateUserRequest, User};

use crate::error::{AppResult, ValidationErrors};
use validator::Validate;

/// Run the derived validation rules, collecting violations by field
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request
        .validate()
        .map_err(|errs| ValidationErrors::from(errs).into())
}
