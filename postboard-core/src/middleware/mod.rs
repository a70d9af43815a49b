//! Request middleware: error handling, authentication and access logging

pub mod auth;
pub mod error;
pub mod logging;

pub use auth::{require_auth, AuthenticatedUser};
pub use error::{
    error_handler, ErrorHandlerConfig, ErrorHandling, ErrorWriter, PanicError, REQUEST_ID_HEADER,
};
pub use logging::request_logging;
