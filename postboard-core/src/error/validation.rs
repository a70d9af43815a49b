//! Field-level validation error collection

use super::types::{AppError, ErrorCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Ordered collection of VALIDATION_ERROR entries
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<AppError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`
    pub fn add(&mut self, field: impl AsRef<str>, message: impl Into<String>) {
        self.errors.push(AppError::validation(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[AppError] {
        &self.errors
    }

    /// Collapse into a single error carrying every entry under
    /// `validation_errors`. An empty collection yields `None`.
    pub fn to_app_error(&self) -> Option<AppError> {
        if !self.has_errors() {
            return None;
        }

        let entries = serde_json::to_value(&self.errors).unwrap_or(Value::Null);
        Some(
            AppError::new(ErrorCode::ValidationError, "Multiple validation errors")
                .with_context("validation_errors", entries),
        )
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation failed")
        } else {
            write!(f, "validation failed: {} errors", self.errors.len())
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<validator::ValidationErrors> for ValidationErrors {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errs.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = ValidationErrors::new();
        for (field, failures) in fields {
            for failure in failures.iter() {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| describe_rule(field, &failure.code));
                out.add(field, message);
            }
        }
        out
    }
}

fn describe_rule(field: &str, rule: &str) -> String {
    match rule {
        "length" => format!("{} has an invalid length", field),
        "email" => "must be a valid email address".to_string(),
        "required" => format!("{} is required", field),
        other => format!("{} failed the {} check", field, other),
    }
}
