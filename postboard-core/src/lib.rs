//! Users and posts REST API
//!
//! The interesting part is the error pipeline: handlers and services return
//! [`AppError`], the error middleware recovers panics and renders every
//! failure as one uniform, sanitized JSON envelope, and the [`Logger`]
//! records each failure with request and user correlation.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod response;
pub mod service;
pub mod storage;

pub use context::{ContextKey, RequestContext};
pub use error::{AnyError, AppError, AppResult, ErrorCode};
pub use logger::Logger;
pub use response::ResponseWriter;
