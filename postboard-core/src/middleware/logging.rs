//! Access log

use crate::context::RequestContext;
use crate::logger::Logger;
use crate::response::PendingError;
use std::error::Error as StdError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Record method, path, status and duration of every request
pub async fn request_logging(State(logger): State<Logger>, req: Request, next: Next) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    // Handler errors are rendered further out but are visible here
    let err = response
        .extensions()
        .get::<PendingError>()
        .map(|pending| &pending.0 as &(dyn StdError + 'static));
    logger.log_http_request(
        &ctx,
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
        err,
    );
    response
}
