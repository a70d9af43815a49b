//! Error-handling middleware
//!
//! Wraps every request. It establishes the [`RequestContext`], installs a
//! per-request [`ErrorWriter`], recovers panics from the inner service and
//! renders any [`PendingError`] produced by a handler. At most one error
//! body is written per request.

use crate::context::{ContextKey, RequestContext};
use crate::error::{AnyError, AppError};
use crate::logger::{self, Logger};
use crate::response::{json_response, status_from, ErrorEnvelope, PendingError};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

thread_local! {
    /// Backtrace of the most recent panic on this thread, taken while the
    /// panicking frames were still on the stack
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Wrap the process panic hook once so recovered panics keep the stack
/// trace of the panic site. The previous hook still runs.
pub fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred while processing your request";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorHandlerConfig {
    /// Attach a stack trace to recovered panics
    pub enable_stack_trace: bool,
    /// Show details and context of 5xx errors to clients
    pub enable_detailed_errors: bool,
    /// Client message for sanitized 5xx errors
    pub default_message: String,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            enable_stack_trace: false,
            enable_detailed_errors: false,
            default_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Middleware state: configuration plus the logger errors are reported to
#[derive(Debug, Clone)]
pub struct ErrorHandling {
    pub config: Arc<ErrorHandlerConfig>,
    pub logger: Logger,
}

impl ErrorHandling {
    pub fn new(config: ErrorHandlerConfig, logger: Logger) -> Self {
        install_panic_hook();
        Self {
            config: Arc::new(config),
            logger,
        }
    }
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self::new(ErrorHandlerConfig::default(), logger::global().clone())
    }
}

/// Cause attached to errors synthesized from a recovered panic
#[derive(Debug, Error)]
#[error("panic: {0}")]
pub struct PanicError(pub String);

/// Per-request error writer. Clones share the written flag.
#[derive(Debug, Clone)]
pub struct ErrorWriter {
    written: Arc<AtomicBool>,
    handling: ErrorHandling,
    ctx: RequestContext,
    method: Method,
    path: String,
    header_request_id: Option<String>,
}

impl ErrorWriter {
    pub fn new(
        handling: ErrorHandling,
        ctx: RequestContext,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Self {
        Self {
            written: Arc::new(AtomicBool::new(false)),
            handling,
            ctx,
            method: method.clone(),
            path: path.to_string(),
            header_request_id: header_value(headers, &REQUEST_ID_HEADER),
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Request id from the context, else from the `X-Request-ID` header
    pub fn request_id(&self) -> Option<String> {
        self.ctx
            .request_id()
            .or_else(|| self.header_request_id.clone())
    }

    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::SeqCst)
    }

    /// Render `err` as the request's error response.
    ///
    /// Returns `None` if an error was already written for this request.
    pub fn write_error(&self, err: impl Into<AnyError>) -> Option<Response> {
        if self.written.swap(true, Ordering::SeqCst) {
            self.handling.logger.with_context(&self.ctx).debug(
                "Error already written for request",
                &[("path", Value::from(self.path.as_str()))],
            );
            return None;
        }

        let mut err = err.into().normalize();
        if err.request_id().is_none() {
            if let Some(id) = self.request_id() {
                err = err.with_request_id(id);
            }
        }
        if err.user_id().is_none() {
            if let Some(id) = self.ctx.user_id() {
                err = err.with_user_id(id);
            }
        }

        self.log_error(&err);

        let envelope = ErrorEnvelope::build(&err, &self.handling.config);
        Some(json_response(status_from(err.status_code()), &envelope))
    }

    fn log_error(&self, err: &AppError) {
        let mut log = self
            .handling
            .logger
            .with_context(&self.ctx)
            .in_function(crate::function_name!());
        if let Some(id) = err.request_id() {
            log = log.with_request_id(id);
        }
        if let Some(id) = err.user_id() {
            log = log.with_user_id(id);
        }

        let status = err.status_code();
        if status >= 500 {
            log.error(
                "Server error occurred",
                Some(err),
                &[
                    ("method", Value::from(self.method.as_str())),
                    ("path", Value::from(self.path.as_str())),
                    ("status_code", Value::from(status)),
                    ("error_code", Value::from(err.code().as_str())),
                ],
            );
        } else if status >= 400 {
            log.warn(
                "Client error occurred",
                &[
                    ("method", Value::from(self.method.as_str())),
                    ("path", Value::from(self.path.as_str())),
                    ("status_code", Value::from(status)),
                    ("error_code", Value::from(err.code().as_str())),
                    ("message", Value::from(err.message())),
                ],
            );
        }
    }
}

/// Outermost application middleware; see the module docs.
pub async fn error_handler(
    State(handling): State<ErrorHandling>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let request_id = ctx
        .request_id()
        .or_else(|| header_value(req.headers(), &REQUEST_ID_HEADER))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ctx.set(ContextKey::RequestId, request_id.clone());
    if let Some(trace_id) = header_value(req.headers(), &TRACE_ID_HEADER) {
        ctx.set(ContextKey::TraceId, trace_id);
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let writer = ErrorWriter::new(handling.clone(), ctx.clone(), &method, &path, req.headers());

    req.extensions_mut().insert(ctx.clone());
    req.extensions_mut().insert(handling.clone());
    req.extensions_mut().insert(writer.clone());

    let outcome = AssertUnwindSafe(next.run(req)).catch_unwind().await;

    let mut response = match outcome {
        Ok(response) => render_pending(&writer, response),
        Err(payload) => {
            let err = panic_error(&handling, &ctx, &method, &path, payload);
            writer
                .write_error(err)
                .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn render_pending(writer: &ErrorWriter, mut response: Response) -> Response {
    if let Some(PendingError(err)) = response.extensions_mut().remove::<PendingError>() {
        return writer.write_error(err).unwrap_or(response);
    }

    // Bare error statuses produced outside the handlers (unmatched methods,
    // extractor rejections from other crates) get the uniform envelope too.
    let status = response.status();
    if status.as_u16() >= 400 && !writer.is_written() {
        let message = status.canonical_reason().unwrap_or("Request failed");
        if let Some(rendered) = writer.write_error(AppError::from_http_status(status.as_u16(), message)) {
            return rendered;
        }
    }
    response
}

fn panic_error(
    handling: &ErrorHandling,
    ctx: &RequestContext,
    method: &Method,
    path: &str,
    payload: Box<dyn Any + Send>,
) -> AppError {
    let cause = PanicError(panic_message(payload.as_ref()));
    // Polling resumes on the panicking thread, so the slot holds this panic
    let stack_trace =
        take_panic_trace().unwrap_or_else(|| Backtrace::force_capture().to_string());

    handling
        .logger
        .with_context(ctx)
        .in_function(crate::function_name!())
        .error(
            "Panic recovered",
            Some(&cause),
            &[
                ("method", Value::from(method.as_str())),
                ("path", Value::from(path)),
                ("stack_trace", Value::from(stack_trace.as_str())),
            ],
        );

    let mut err = AppError::internal("Internal server error")
        .with_context("panic", true)
        .with_internal(cause);
    if handling.config.enable_stack_trace {
        err = err.with_context("stack_trace", stack_trace);
    }
    err
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
