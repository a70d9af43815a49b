//! Constructor methods for AppError
//!
//! Factory methods for the common failure shapes. Messages produced here are
//! client-facing, so they never embed the wrapped cause.

use super::types::{AppError, ErrorCode};
use std::error::Error as StdError;

impl AppError {
    /// Create a not-found error for a named resource
    ///
    /// # Examples
    /// ```rust
    /// use postboard_core::error::AppError;
    ///
    /// let err = AppError::not_found("user");
    /// assert_eq!(err.message(), "user not found");
    /// assert_eq!(err.status_code(), 404);
    /// ```
    pub fn not_found(resource: impl AsRef<str>) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{} not found", resource.as_ref()),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create a field-level validation error
    ///
    /// The field name is kept under the `field` context key so clients can
    /// map the failure back to their form.
    pub fn validation(field: impl AsRef<str>, message: impl Into<String>) -> Self {
        let field = field.as_ref();
        Self::new(
            ErrorCode::ValidationError,
            format!("Validation failed for field '{}'", field),
        )
        .with_details(message)
        .with_context("field", field)
    }

    /// Create an authentication error; an empty message uses the default
    pub fn unauthorized(message: impl Into<String>) -> Self {
        let message = non_empty(message.into(), "Authentication required");
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create an authorization error; an empty message uses the default
    pub fn forbidden(message: impl Into<String>) -> Self {
        let message = non_empty(message.into(), "Access denied");
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn conflict(resource: impl AsRef<str>, details: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!("{} already exists", resource.as_ref()),
        )
        .with_details(details)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimitExceeded, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Create a database error wrapping the storage failure
    pub fn database<E>(operation: impl AsRef<str>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(
            ErrorCode::DatabaseError,
            format!("Database operation failed: {}", operation.as_ref()),
        )
        .with_internal(cause)
    }

    /// Create an error for a failing downstream dependency
    pub fn external_service<E>(service: impl AsRef<str>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("External service '{}' error", service.as_ref()),
        )
        .with_internal(cause)
    }

    /// Build an error from a bare HTTP status.
    ///
    /// The code is the one whose default status matches; statuses with no
    /// matching code become INTERNAL_ERROR for 5xx and BAD_REQUEST otherwise.
    /// The given status is always the one reported.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let code = match status {
            400 => ErrorCode::BadRequest,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            429 => ErrorCode::RateLimitExceeded,
            503 => ErrorCode::ServiceUnavailable,
            s if s >= 500 => ErrorCode::InternalError,
            _ => ErrorCode::BadRequest,
        };
        Self::new(code, message).with_http_status(status)
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
