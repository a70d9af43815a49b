//! Core error types for Postboard
//!
//! This module contains the [`ErrorCode`] taxonomy, the [`AppError`] value
//! and the [`AnyError`] sum type used to normalize arbitrary failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Shared, thread-safe handle to a wrapped lower-level error.
pub type InternalCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Symbolic error category, stable across releases
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Client errors
    NotFound,
    BadRequest,
    ValidationError,
    Unauthorized,
    Forbidden,
    Conflict,
    RateLimitExceeded,

    // Server errors
    InternalError,
    ServiceUnavailable,
    DatabaseError,
    ExternalServiceError,

    /// A code received from outside the known taxonomy
    Unknown(String),
}

impl ErrorCode {
    /// Every known code, in declaration order
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::NotFound,
        ErrorCode::BadRequest,
        ErrorCode::ValidationError,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::Conflict,
        ErrorCode::RateLimitExceeded,
        ErrorCode::InternalError,
        ErrorCode::ServiceUnavailable,
        ErrorCode::DatabaseError,
        ErrorCode::ExternalServiceError,
    ];

    /// Wire representation of the code
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::Unknown(code) => code.as_str(),
        }
    }

    /// Default HTTP status for the code. Total: unknown codes map to 500.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::BadRequest | ErrorCode::ValidationError => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::Conflict => 409,
            ErrorCode::RateLimitExceeded => 429,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::InternalError
            | ErrorCode::DatabaseError
            | ErrorCode::ExternalServiceError => 500,
            ErrorCode::Unknown(_) => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = ErrorCode::ALL
            .iter()
            .find(|code| code.as_str() == s)
            .cloned()
            .unwrap_or_else(|| ErrorCode::Unknown(s.to_string()));
        Ok(code)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|never| match never {}))
    }
}

/// Structured application error
///
/// `code`, `message` and the HTTP status are fixed once built; details,
/// context, the internal cause and the correlation identifiers are added
/// with the consuming `with_*` builders.
///
/// # Examples
/// ```rust
/// use postboard_core::error::{AppError, ErrorCode};
///
/// let err = AppError::new(ErrorCode::NotFound, "user not found")
///     .with_context("table", "users")
///     .with_request_id("req-1");
/// assert_eq!(err.status_code(), 404);
/// assert_eq!(err.to_string(), "NOT_FOUND: user not found");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    details: String,
    #[serde(skip)]
    http_status: u16,
    #[serde(skip)]
    status_overridden: bool,
    #[serde(skip)]
    internal: Option<InternalCause>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    context: Map<String, Value>,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl AppError {
    /// Create an error whose HTTP status is taken from the code table
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let http_status = code.http_status();
        Self {
            code,
            message: message.into(),
            details: String::new(),
            http_status,
            status_overridden: false,
            internal: None,
            context: Map::new(),
            timestamp: Utc::now(),
            request_id: None,
            user_id: None,
        }
    }

    /// Attach a human-readable elaboration
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Merge one context entry; the last write for a key wins
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Wrap the lower-level error that caused this one
    pub fn with_internal<E>(mut self, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.internal = Some(Arc::new(err));
        self
    }

    /// Wrap an already boxed cause
    pub fn with_internal_boxed(mut self, err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        self.internal = Some(Arc::from(err));
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Override the status derived from the code.
    ///
    /// Only the first override takes effect.
    pub fn with_http_status(mut self, status: u16) -> Self {
        if !self.status_overridden {
            self.http_status = status;
            self.status_overridden = true;
        }
        self
    }

    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn status_code(&self) -> u16 {
        self.http_status
    }

    pub fn internal_cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.internal.as_deref()
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// True for 5xx-class errors
    pub fn is_server_error(&self) -> bool {
        self.http_status >= 500
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            write!(f, "{}: {} - {}", self.code, self.message, self.details)
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.internal
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Either a domain error or any other failure
#[derive(Debug)]
pub enum AnyError {
    Domain(AppError),
    Opaque(Box<dyn StdError + Send + Sync + 'static>),
}

impl AnyError {
    /// Wrap an arbitrary error, recovering an `AppError` if that is what it is
    pub fn opaque<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from(Box::new(err) as Box<dyn StdError + Send + Sync + 'static>)
    }

    /// Collapse into an `AppError`, synthesizing an internal error when needed
    pub fn normalize(self) -> AppError {
        match self {
            AnyError::Domain(err) => err,
            AnyError::Opaque(err) => {
                AppError::internal("An unexpected error occurred").with_internal_boxed(err)
            }
        }
    }
}

impl From<AppError> for AnyError {
    fn from(err: AppError) -> Self {
        AnyError::Domain(err)
    }
}

impl From<Box<dyn StdError + Send + Sync + 'static>> for AnyError {
    fn from(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => AnyError::Domain(*app),
            Err(other) => AnyError::Opaque(other),
        }
    }
}

/// Report whether `err`, or anything in its cause chain, is an `AppError`
pub fn is_app_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.downcast_ref::<AppError>().is_some() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Normalize an optional error. `None` stays `None`.
pub fn as_app_error<E>(err: Option<E>) -> Option<AppError>
where
    E: Into<AnyError>,
{
    err.map(|err| err.into().normalize())
}

pub type AppResult<T> = std::result::Result<T, AppError>;
