use crate::response::ResponseWriter;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub checked_at: DateTime<Utc>,
}

/// Liveness probe
pub async fn health_check(resp: ResponseWriter) -> Response {
    resp.json_with_message(
        axum::http::StatusCode::OK,
        HealthStatus {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            checked_at: Utc::now(),
        },
        "Server is healthy",
    )
}
