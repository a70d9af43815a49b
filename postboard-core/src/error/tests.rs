//! Tests for the error model
//!
//! Covers the status table, display format, normalization of foreign errors
//! and the conversions used with the `?` operator.

use super::*;
use pretty_assertions::assert_eq;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom")
    }
}

impl StdError for Boom {}

#[test]
fn test_status_table_is_total() {
    let expected = [
        (ErrorCode::NotFound, 404),
        (ErrorCode::BadRequest, 400),
        (ErrorCode::ValidationError, 400),
        (ErrorCode::Unauthorized, 401),
        (ErrorCode::Forbidden, 403),
        (ErrorCode::Conflict, 409),
        (ErrorCode::RateLimitExceeded, 429),
        (ErrorCode::InternalError, 500),
        (ErrorCode::ServiceUnavailable, 503),
        (ErrorCode::DatabaseError, 500),
        (ErrorCode::ExternalServiceError, 500),
    ];
    for (code, status) in expected {
        assert_eq!(AppError::new(code.clone(), "x").status_code(), status, "{}", code);
    }

    let unknown: ErrorCode = "SOMETHING_ELSE".parse().unwrap();
    assert_eq!(unknown, ErrorCode::Unknown("SOMETHING_ELSE".to_string()));
    assert_eq!(AppError::new(unknown, "x").status_code(), 500);
}

#[test]
fn test_code_string_round_trip() {
    for code in ErrorCode::ALL {
        let parsed: ErrorCode = code.as_str().parse().unwrap();
        assert_eq!(parsed, code);
    }
    assert_eq!(
        serde_json::to_value(ErrorCode::RateLimitExceeded).unwrap(),
        serde_json::json!("RATE_LIMIT_EXCEEDED")
    );
}

#[test]
fn test_display_format() {
    let plain = AppError::new(ErrorCode::NotFound, "user not found");
    assert_eq!(plain.to_string(), "NOT_FOUND: user not found");

    let detailed = plain.with_details("id 42");
    assert_eq!(detailed.to_string(), "NOT_FOUND: user not found - id 42");
}

#[test]
fn test_builders_accumulate() {
    let err = AppError::bad_request("bad")
        .with_context("a", 1)
        .with_context("b", "two")
        .with_context("a", 3)
        .with_request_id("req-1")
        .with_user_id("user-1");

    assert_eq!(err.context().len(), 2);
    assert_eq!(err.context()["a"], serde_json::json!(3));
    assert_eq!(err.request_id(), Some("req-1"));
    assert_eq!(err.user_id(), Some("user-1"));
    assert_eq!(err.code(), &ErrorCode::BadRequest);
}

#[test]
fn test_status_override_applies_once() {
    let err = AppError::internal("x").with_http_status(502).with_http_status(504);
    assert_eq!(err.status_code(), 502);
    assert_eq!(err.code(), &ErrorCode::InternalError);
}

#[test]
fn test_constructor_messages() {
    assert_eq!(AppError::not_found("user").message(), "user not found");
    assert_eq!(AppError::unauthorized("").message(), "Authentication required");
    assert_eq!(AppError::unauthorized("bad token").message(), "bad token");
    assert_eq!(AppError::forbidden("").message(), "Access denied");

    let conflict = AppError::conflict("user", "username taken");
    assert_eq!(conflict.message(), "user already exists");
    assert_eq!(conflict.details(), "username taken");
    assert_eq!(conflict.status_code(), 409);

    let db = AppError::database("insert user", Boom);
    assert_eq!(db.message(), "Database operation failed: insert user");
    assert_eq!(db.code(), &ErrorCode::DatabaseError);
    assert!(db.internal_cause().is_some());

    let ext = AppError::external_service("mailer", Boom);
    assert_eq!(ext.message(), "External service 'mailer' error");
    assert_eq!(ext.status_code(), 500);
}

#[test]
fn test_validation_constructor() {
    let err = AppError::validation("email", "must be a valid email address");
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.code(), &ErrorCode::ValidationError);
    assert_eq!(err.message(), "Validation failed for field 'email'");
    assert_eq!(err.details(), "must be a valid email address");
    assert_eq!(err.context()["field"], serde_json::json!("email"));
}

#[test]
fn test_from_http_status() {
    let err = AppError::from_http_status(404, "gone");
    assert_eq!(err.code(), &ErrorCode::NotFound);
    assert_eq!(err.status_code(), 404);

    let err = AppError::from_http_status(502, "upstream");
    assert_eq!(err.code(), &ErrorCode::InternalError);
    assert_eq!(err.status_code(), 502);

    let err = AppError::from_http_status(418, "teapot");
    assert_eq!(err.code(), &ErrorCode::BadRequest);
    assert_eq!(err.status_code(), 418);
}

#[test]
fn test_as_app_error_none_stays_none() {
    assert!(as_app_error::<AppError>(None).is_none());
}

#[test]
fn test_as_app_error_wraps_foreign_error() {
    let err = as_app_error(Some(AnyError::opaque(Boom))).unwrap();
    assert_eq!(err.code(), &ErrorCode::InternalError);
    assert_eq!(err.message(), "An unexpected error occurred");

    let source = err.source().expect("cause should be kept");
    assert_eq!(source.to_string(), "boom");
    assert!(source.downcast_ref::<Boom>().is_some());
}

#[test]
fn test_as_app_error_passes_app_error_through() {
    let original = AppError::not_found("post").with_context("id", "p1");
    let err = as_app_error(Some(original.clone())).unwrap();
    assert_eq!(err.code(), original.code());
    assert_eq!(err.message(), original.message());
    assert_eq!(err.context(), original.context());

    // A boxed AppError is recovered rather than wrapped
    let boxed: Box<dyn StdError + Send + Sync> = Box::new(original);
    let err = as_app_error(Some(boxed)).unwrap();
    assert_eq!(err.code(), &ErrorCode::NotFound);
}

#[test]
fn test_is_app_error_walks_chain() {
    let app = AppError::internal("outer");
    assert!(is_app_error(&app));
    assert!(!is_app_error(&Boom));

    #[derive(Debug)]
    struct Wrapper(AppError);
    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapper")
        }
    }
    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }
    assert!(is_app_error(&Wrapper(AppError::bad_request("inner"))));
}

#[test]
fn test_internal_cause_is_never_serialized() {
    let err = AppError::database("select", Boom).with_details("row 7");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["code"], "DATABASE_ERROR");
    assert_eq!(json["details"], "row 7");
    assert!(json.get("internal").is_none());
    assert!(!json.to_string().contains("boom"));
}

#[test]
fn test_validation_errors_empty() {
    let errs = ValidationErrors::new();
    assert!(!errs.has_errors());
    assert!(errs.to_app_error().is_none());
    assert_eq!(errs.to_string(), "validation failed");

    let err: AppError = errs.into();
    assert_eq!(err.code(), &ErrorCode::BadRequest);
    assert_eq!(err.message(), "Validation failed");
}

#[test]
fn test_validation_errors_collapse() {
    let mut errs = ValidationErrors::new();
    errs.add("username", "too short");
    errs.add("password", "too short");
    assert!(errs.has_errors());
    assert_eq!(errs.to_string(), "validation failed: 2 errors");

    let err = errs.to_app_error().unwrap();
    assert_eq!(err.code(), &ErrorCode::ValidationError);
    assert_eq!(err.message(), "Multiple validation errors");
    let entries = err.context()["validation_errors"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["context"]["field"], "username");
}

#[test]
fn test_option_and_result_context() {
    let missing: Option<u32> = None;
    let err = missing.not_found("post").unwrap_err();
    assert_eq!(err.message(), "post not found");

    let failed: Result<(), AppError> = Err(AppError::internal("x"));
    let err = failed.db_context("list_posts").unwrap_err();
    assert_eq!(err.context()["operation"], "list_posts");
}

#[test]
fn test_uuid_error_conversion() {
    fn parse(raw: &str) -> AppResult<uuid::Uuid> {
        Ok(uuid::Uuid::parse_str(raw)?)
    }
    let err = parse("not-a-uuid").unwrap_err();
    assert_eq!(err.code(), &ErrorCode::BadRequest);
    assert_eq!(err.message(), "Invalid identifier");
}

#[tokio::test]
async fn test_join_error_conversion() {
    async fn run() -> AppResult<()> {
        let handle = tokio::spawn(async { panic!("task failure") });
        handle.await?;
        Ok(())
    }

    let err = run().await.unwrap_err();
    assert_eq!(err.code(), &ErrorCode::InternalError);
    assert_eq!(err.message(), "Background task panicked");
}

#[tokio::test]
async fn test_failed_storage_task_is_database_error() {
    let source = tokio::spawn(async { panic!("worker died") }).await.unwrap_err();
    let err = AppError::from(crate::storage::StorageError::Task {
        operation: "create post",
        source,
    });

    assert_eq!(err.code(), &ErrorCode::DatabaseError);
    assert_eq!(err.message(), "Database operation failed: create post");
    assert!(err.internal_cause().is_some());
}
