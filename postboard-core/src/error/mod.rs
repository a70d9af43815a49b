//! Error model for Postboard
//!
//! Every failure that can reach a client is expressed as an [`AppError`]: a
//! symbolic [`ErrorCode`], a client-safe message, optional details, the HTTP
//! status derived from the code, an optional wrapped cause that is only ever
//! logged, free-form context, and request/user correlation identifiers.
//!
//! ## Error Categories
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Postboard Error Taxonomy                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Client Errors (4xx)          │  Server Errors (5xx)         │
//! │  ┌─────────────────────────┐  │  ┌────────────────────────┐  │
//! │  │ • NOT_FOUND             │  │  │ • INTERNAL_ERROR       │  │
//! │  │ • BAD_REQUEST           │  │  │ • SERVICE_UNAVAILABLE  │  │
//! │  │ • VALIDATION_ERROR      │  │  │ • DATABASE_ERROR       │  │
//! │  │ • UNAUTHORIZED          │  │  │ • EXTERNAL_SERVICE_... │  │
//! │  │ • FORBIDDEN             │  │  └────────────────────────┘  │
//! │  │ • CONFLICT              │  │                              │
//! │  │ • RATE_LIMIT_EXCEEDED   │  │                              │
//! │  └─────────────────────────┘  │                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inner layers return errors; only the HTTP boundary normalizes, sanitizes
//! and logs them.

pub mod types;
pub mod constructors;
pub mod context;
pub mod conversions;
pub mod validation;

#[cfg(test)]
mod tests;

pub use types::{as_app_error, is_app_error, AnyError, AppError, AppResult, ErrorCode};
pub use context::{ErrorContext, OptionContext};
pub use validation::ValidationErrors;
