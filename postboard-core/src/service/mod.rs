//! Business operations over the repositories
//!
//! Services return `AppResult`; storage failures are converted here and
//! reported once, by the HTTP boundary. Successful storage calls are timed
//! and recorded with [`Logger::log_database_operation`].

pub mod auth;
pub mod post;
pub mod user;

pub use auth::{AuthService, Claims, IssuedToken, TokenError};
pub use post::PostService;
pub use user::{hash_password, UserService};

use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::logger::Logger;
use crate::storage::StorageResult;
use std::future::Future;
use std::time::Instant;

/// Await a storage call, logging its duration when it succeeds
pub(crate) async fn timed<T, F>(
    logger: &Logger,
    ctx: &RequestContext,
    operation: &str,
    table: &str,
    call: F,
) -> AppResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    let start = Instant::now();
    let result = call.await;
    if result.is_ok() {
        logger.log_database_operation(ctx, operation, table, start.elapsed(), None);
    }
    result.map_err(AppError::from)
}
