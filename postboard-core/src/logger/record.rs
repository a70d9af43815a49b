//! Log record shapes
//!
//! Records are built per call and handed to a [`super::LogSink`]; they are
//! never stored by the logger itself.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(rename = "context", skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            service: String::new(),
            version: String::new(),
            request_id: None,
            user_id: None,
            trace_id: None,
            method: None,
            path: None,
            status_code: None,
            duration: None,
            error: None,
            source: None,
            fields: Map::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Structured error sub-record, if the record carries one
    pub fn error_record(&self) -> Option<&ErrorRecord> {
        match &self.error {
            Some(ErrorField::Structured(record)) => Some(record),
            _ => None,
        }
    }

    /// JSON rendering of the record; never fails
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{} {} {}", self.timestamp.to_rfc3339(), self.level, self.message)
        })
    }
}

/// Error attached to a record: structured for `AppError`, text otherwise
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ErrorField {
    Structured(ErrorRecord),
    Plain(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(rename = "internal_error", skip_serializing_if = "Option::is_none")]
    pub internal: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ErrorRecord {
    /// Build the sub-record. A stack trace is captured only when the error
    /// wraps an internal cause.
    pub fn from_app_error(err: &AppError) -> Self {
        let internal = err.internal_cause().map(|cause| cause.to_string());
        let stack_trace = internal
            .as_ref()
            .map(|_| Backtrace::force_capture().to_string());

        Self {
            code: err.code().to_string(),
            message: err.message().to_string(),
            details: err.details().to_string(),
            stack_trace,
            internal,
            context: err.context().clone(),
            request_id: err.request_id().map(str::to_string),
            user_id: err.user_id().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl From<&Location<'_>> for SourceInfo {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
            function: None,
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)?;
        match &self.function {
            Some(function) => write!(f, " ({})", function),
            None => Ok(()),
        }
    }
}
