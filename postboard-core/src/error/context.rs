//! Extension traits for attaching context while propagating errors
//!
//! ```rust,ignore
//! let user = store.get_by_id(id).await.db_context("get_user")?;
//! let post = posts.iter().find(|p| p.id == id).not_found("post")?;
//! ```

use super::types::{AppError, AppResult};
use serde_json::Value;

/// Trait for adding context to fallible results
pub trait ErrorContext<T> {
    /// Convert the error and record the database operation that failed
    fn db_context(self, operation: &str) -> AppResult<T>;

    /// Convert the error and merge one context entry into it
    fn with_error_context(self, key: &str, value: impl Into<Value>) -> AppResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn db_context(self, operation: &str) -> AppResult<T> {
        self.map_err(|e| e.into().with_context("operation", operation))
    }

    fn with_error_context(self, key: &str, value: impl Into<Value>) -> AppResult<T> {
        self.map_err(|e| e.into().with_context(key, value))
    }
}

/// Trait for turning missing values into errors
pub trait OptionContext<T> {
    /// `None` becomes NOT_FOUND for the named resource
    fn not_found(self, resource: &str) -> AppResult<T>;

    /// `None` becomes BAD_REQUEST with the given message
    fn or_bad_request(self, message: &str) -> AppResult<T>;
}

impl<T> OptionContext<T> for Option<T> {
    fn not_found(self, resource: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::not_found(resource))
    }

    fn or_bad_request(self, message: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::bad_request(message))
    }
}
