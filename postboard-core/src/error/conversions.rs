//! Error conversion implementations for AppError
//!
//! This module provides From trait implementations for converting
//! external and lower-layer error types into AppError values.

use super::types::AppError;
use super::validation::ValidationErrors;
use crate::service::auth::TokenError;
use crate::storage::StorageError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};

// Storage error conversions
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity } => AppError::not_found(entity),
            StorageError::Conflict { entity, detail } => AppError::conflict(entity, detail),
            StorageError::Backend { ref operation, .. } => {
                let operation = operation.clone();
                AppError::database(operation, err)
            }
            StorageError::Codec { entity, .. } => {
                AppError::database(format!("decode {}", entity), err)
            }
            StorageError::Task { operation, .. } => AppError::database(operation, err),
        }
    }
}

impl From<redb::Error> for AppError {
    fn from(err: redb::Error) -> Self {
        AppError::database("storage", err)
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::internal("Failed to encode stored record").with_internal(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::internal("Failed to serialize data").with_internal(err)
    }
}

// Request extraction conversions
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request("Invalid request body").with_details(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request("Invalid path parameter").with_details(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request("Invalid query parameters").with_details(rejection.body_text())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::bad_request("Invalid identifier")
            .with_details(err.to_string())
            .with_internal(err)
    }
}

// Validation conversions
impl From<ValidationErrors> for AppError {
    fn from(errs: ValidationErrors) -> Self {
        errs.to_app_error()
            .unwrap_or_else(|| AppError::bad_request("Validation failed"))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        ValidationErrors::from(errs).into()
    }
}

// Runtime conversions
impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        let message = if err.is_panic() {
            "Background task panicked"
        } else {
            "Background task was cancelled"
        };
        AppError::internal(message).with_internal(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::unauthorized("Invalid or expired token").with_internal(err)
    }
}
