//! Uniform JSON envelopes and the per-request response writer
//!
//! Every body the API produces is either a [`SuccessEnvelope`] or an
//! [`ErrorEnvelope`]. Handlers obtain a [`ResponseWriter`] as an extractor
//! and return `AppResult<Response>`; an `AppError` returned with `?` is
//! carried out of the handler as a [`PendingError`] and rendered by
//! [`crate::middleware::error_handler`] with the request's correlation data.

use crate::context::RequestContext;
use crate::error::{AnyError, AppError, ErrorCode, ValidationErrors};
use crate::middleware::error::{ErrorHandlerConfig, ErrorHandling, ErrorWriter};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;


pub const CREATED_MESSAGE: &str = "Resource created successfully";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    /// Client view of an error.
    ///
    /// Details and context are shown for 4xx, or for everything when
    /// detailed errors are enabled. Otherwise a 5xx is reduced to the
    /// configured default message under INTERNAL_ERROR.
    pub fn build(err: &AppError, config: &ErrorHandlerConfig) -> Self {
        let status = err.status_code();
        let show_detail = config.enable_detailed_errors || status < 500;

        let mut envelope = Self {
            success: false,
            error: err.message().to_string(),
            code: err.code().clone(),
            details: None,
            context: None,
            timestamp: err.timestamp(),
            request_id: err.request_id().map(str::to_string),
        };

        if show_detail {
            if !err.details().is_empty() {
                envelope.details = Some(err.details().to_string());
            }
            if !err.context().is_empty() {
                envelope.context = Some(err.context().clone());
            }
        } else {
            envelope.error = config.default_message.clone();
            envelope.code = ErrorCode::InternalError;
        }

        envelope
    }
}

/// An `AppError` travelling out of a handler, waiting to be rendered
#[derive(Debug, Clone)]
pub struct PendingError(pub AppError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Standalone rendering; the error middleware replaces it.
        let envelope = ErrorEnvelope::build(&self, &ErrorHandlerConfig::default());
        let mut response = json_response(status_from(self.status_code()), &envelope);
        response.extensions_mut().insert(PendingError(self));
        response
    }
}

/// Serialize `body` as JSON. Encoding failures degrade to a plain-text 500.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = (status, bytes).into_response();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
    }
}

pub(crate) fn status_from(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Writes success and error responses for one request
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    writer: ErrorWriter,
}

impl ResponseWriter {
    pub fn new(writer: ErrorWriter) -> Self {
        Self { writer }
    }

    pub fn context(&self) -> &RequestContext {
        self.writer.context()
    }

    /// 200 with `data`
    pub fn success<T: Serialize>(&self, data: T) -> Response {
        self.json_with_message(StatusCode::OK, data, "")
    }

    /// 201 with `data` and the standard creation message
    pub fn created<T: Serialize>(&self, data: T) -> Response {
        self.json_with_message(StatusCode::CREATED, data, CREATED_MESSAGE)
    }

    pub fn no_content(&self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }

    /// Success envelope with an optional message; empty means none
    pub fn json_with_message<T: Serialize>(
        &self,
        status: StatusCode,
        data: T,
        message: &str,
    ) -> Response {
        let envelope = self.envelope(status, data, message, None);
        json_response(status, &envelope)
    }

    pub fn json_with_meta<T: Serialize, M: Serialize>(
        &self,
        status: StatusCode,
        data: T,
        message: &str,
        meta: M,
    ) -> Response {
        let meta = match serde_json::to_value(meta) {
            Ok(meta) => meta,
            Err(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        };
        let envelope = self.envelope(status, data, message, Some(meta));
        json_response(status, &envelope)
    }

    /// Normalize, correlate, log and render an error.
    ///
    /// Only the first error written for a request produces a body; later
    /// calls return an empty response with the error's status.
    pub fn error(&self, err: impl Into<AnyError>) -> Response {
        let err = err.into().normalize();
        let status = status_from(err.status_code());
        self.writer
            .write_error(err)
            .unwrap_or_else(|| status.into_response())
    }

    pub fn bad_request(&self, message: &str) -> Response {
        self.error(AppError::bad_request(message))
    }

    pub fn unauthorized(&self, message: &str) -> Response {
        self.error(AppError::unauthorized(message))
    }

    pub fn forbidden(&self, message: &str) -> Response {
        self.error(AppError::forbidden(message))
    }

    pub fn not_found(&self, resource: &str) -> Response {
        self.error(AppError::not_found(resource))
    }

    pub fn conflict(&self, resource: &str, details: &str) -> Response {
        self.error(AppError::conflict(resource, details))
    }

    pub fn internal_error(&self, message: &str) -> Response {
        self.error(AppError::internal(message))
    }

    pub fn validation_error(&self, errors: &ValidationErrors) -> Response {
        match errors.to_app_error() {
            Some(err) => self.error(err),
            None => self.bad_request("Validation failed"),
        }
    }

    fn envelope<T: Serialize>(
        &self,
        status: StatusCode,
        data: T,
        message: &str,
        meta: Option<Value>,
    ) -> SuccessEnvelope<T> {
        SuccessEnvelope {
            success: status.as_u16() < 400,
            data: Some(data),
            message: (!message.is_empty()).then(|| message.to_string()),
            meta,
            timestamp: Utc::now(),
            request_id: self.writer.request_id(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ResponseWriter
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let writer = match parts.extensions.get::<ErrorWriter>() {
            Some(writer) => writer.clone(),
            None => {
                let handling = parts
                    .extensions
                    .get::<ErrorHandling>()
                    .cloned()
                    .unwrap_or_default();
                let ctx = parts
                    .extensions
                    .get::<RequestContext>()
                    .cloned()
                    .unwrap_or_default();
                ErrorWriter::new(handling, ctx, &parts.method, parts.uri.path(), &parts.headers)
            }
        };
        Ok(Self::new(writer))
    }
}
