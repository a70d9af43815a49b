//! User entity and request schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Hex SHA-256 of the password; never sent to clients
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"),
        custom = "validate_username_content"
    )]
    pub username: String,

    #[validate(length(min = 6, max = 100, message = "Password must be between 6 and 100 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"),
        custom = "validate_username_content"
    )]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, max = 100, message = "Password must be between 6 and 100 characters"))]
    pub password: Option<String>,
}

const SQL_PATTERNS: &[&str] = &[
    "'", "\"", ";", "--", "/*", "*/", "xp_", "sp_", "drop", "delete", "insert", "update",
    "select", "union",
];

const XSS_PATTERNS: &[&str] = &[
    "<script", "</script>", "<iframe", "javascript:", "onload=", "onerror=", "<img", "src=",
    "href=", "onclick=", "onmouseover=",
];

/// Case-insensitive check against a pattern list
fn contains_any(input: &str, patterns: &[&str]) -> bool {
    let lowered = input.to_lowercase();
    patterns.iter().any(|p| lowered.contains(p))
}

pub fn contains_sql_injection(input: &str) -> bool {
    contains_any(input, SQL_PATTERNS)
}

pub fn contains_xss(input: &str) -> bool {
    contains_any(input, XSS_PATTERNS)
}

fn validate_username_content(username: &str) -> Result<(), ValidationError> {
    let (code, message) = if contains_sql_injection(username) {
        ("sql_injection", "Username contains invalid characters")
    } else if contains_xss(username) {
        ("xss", "Username contains potentially dangerous content")
    } else {
        return Ok(());
    };

    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    Err(err)
}
