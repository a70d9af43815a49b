//! Structured application logger
//!
//! The [`Logger`] builds a [`LogRecord`] for every call, enriches it with the
//! service identity and any correlation identifiers it carries, and hands it
//! to a [`LogSink`]. By default records go to `tracing`; tests inject a
//! [`MemorySink`] instead.
//!
//! A process-wide instance is available through [`global`]. It is created
//! lazily with the `postboard` service name unless [`init`] ran first.

pub mod record;
pub mod sink;


pub use record::{ErrorField, ErrorRecord, Level, LogRecord, SourceInfo};
pub use sink::{LogSink, MemorySink, TracingSink};

use crate::context::RequestContext;
use crate::error::AppError;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::error::Error as StdError;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

/// Key/value pairs attached to a record
pub type Fields<'a> = &'a [(&'a str, Value)];

pub const DEFAULT_SERVICE_NAME: &str = "postboard";

/// Fully qualified name of the enclosing function, for
/// [`Logger::in_function`]
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f")
            .unwrap_or(name)
            .trim_end_matches("::{{closure}}")
    }};
}

static GLOBAL_LOGGER: OnceCell<Logger> = OnceCell::new();

/// Install the process-wide logger. Returns `false` if one already exists.
pub fn init(service: impl Into<String>, version: impl Into<String>) -> bool {
    GLOBAL_LOGGER.set(Logger::new(service, version)).is_ok()
}

/// Process-wide logger, created with defaults on first use
pub fn global() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(|| Logger::new(DEFAULT_SERVICE_NAME, env!("CARGO_PKG_VERSION")))
}

#[derive(Debug, Clone)]
pub struct Logger {
    service: Arc<str>,
    version: Arc<str>,
    request_id: Option<String>,
    user_id: Option<String>,
    trace_id: Option<String>,
    function: Option<&'static str>,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Logger that writes through `tracing`
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_sink(service, version, Arc::new(TracingSink))
    }

    pub fn with_sink(
        service: impl Into<String>,
        version: impl Into<String>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            service: Arc::from(service.into()),
            version: Arc::from(version.into()),
            request_id: None,
            user_id: None,
            trace_id: None,
            function: None,
            sink,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Derived logger stamping the context's identifiers on every record.
    /// Identifiers missing from the context are left as they were.
    pub fn with_context(&self, ctx: &RequestContext) -> Logger {
        let mut derived = self.clone();
        if let Some(id) = ctx.request_id() {
            derived.request_id = Some(id);
        }
        if let Some(id) = ctx.user_id() {
            derived.user_id = Some(id);
        }
        if let Some(id) = ctx.trace_id() {
            derived.trace_id = Some(id);
        }
        derived
    }

    pub fn with_request_id(&self, request_id: impl Into<String>) -> Logger {
        let mut derived = self.clone();
        derived.request_id = Some(request_id.into());
        derived
    }

    pub fn with_user_id(&self, user_id: impl Into<String>) -> Logger {
        let mut derived = self.clone();
        derived.user_id = Some(user_id.into());
        derived
    }

    /// Name the calling function in the source location of error records.
    /// `Location` only knows file and line.
    pub fn in_function(&self, function: &'static str) -> Logger {
        let mut derived = self.clone();
        derived.function = Some(function);
        derived
    }

    pub fn debug(&self, message: &str, fields: Fields<'_>) {
        self.emit(self.record(Level::Debug, message, fields));
    }

    pub fn info(&self, message: &str, fields: Fields<'_>) {
        self.emit(self.record(Level::Info, message, fields));
    }

    pub fn warn(&self, message: &str, fields: Fields<'_>) {
        self.emit(self.record(Level::Warn, message, fields));
    }

    /// Log at error level. `AppError`s produce a structured sub-record, any
    /// other error is logged as its text. The caller's location is recorded.
    #[track_caller]
    pub fn error(&self, message: &str, err: Option<&(dyn StdError + 'static)>, fields: Fields<'_>) {
        let location = Location::caller();
        self.error_at(Level::Error, message, err, fields, location);
    }

    /// Log at fatal level and terminate the process with status 1
    #[track_caller]
    pub fn fatal(&self, message: &str, err: Option<&(dyn StdError + 'static)>, fields: Fields<'_>) -> ! {
        let location = Location::caller();
        self.error_at(Level::Fatal, message, err, fields, location);
        std::process::exit(1)
    }

    /// Access-log entry: error for status >= 400, warn for 3xx, info otherwise
    pub fn log_http_request(
        &self,
        ctx: &RequestContext,
        method: &str,
        path: &str,
        status: u16,
        duration: Duration,
        err: Option<&(dyn StdError + 'static)>,
    ) {
        let level = if status >= 400 {
            Level::Error
        } else if status >= 300 {
            Level::Warn
        } else {
            Level::Info
        };

        let mut record = self.with_context(ctx).record(
            level,
            &format!("HTTP {} {}", method, path),
            &[],
        );
        record.method = Some(method.to_string());
        record.path = Some(path.to_string());
        record.status_code = Some(status);
        record.duration = Some(format!("{:?}", duration));
        record.error = err.map(error_field);
        self.emit(record);
    }

    /// Storage timing entry: info on success, error on failure
    pub fn log_database_operation(
        &self,
        ctx: &RequestContext,
        operation: &str,
        table: &str,
        duration: Duration,
        err: Option<&(dyn StdError + 'static)>,
    ) {
        let level = if err.is_some() { Level::Error } else { Level::Info };
        let fields = [
            ("operation", Value::from(operation)),
            ("table", Value::from(table)),
            ("component", Value::from("database")),
        ];

        let mut record = self.with_context(ctx).record(
            level,
            &format!("Database {} on {}", operation, table),
            &fields,
        );
        record.duration = Some(format!("{:?}", duration));
        record.error = err.map(error_field);
        self.emit(record);
    }

    fn error_at(
        &self,
        level: Level,
        message: &str,
        err: Option<&(dyn StdError + 'static)>,
        fields: Fields<'_>,
        location: &Location<'_>,
    ) {
        let mut record = self.record(level, message, fields);
        record.error = err.map(error_field);
        let mut source = SourceInfo::from(location);
        source.function = self.function.map(str::to_string);
        record.source = Some(source);
        self.emit(record);
    }

    fn record(&self, level: Level, message: &str, fields: Fields<'_>) -> LogRecord {
        let mut record = LogRecord::new(level, message);
        record.service = self.service.to_string();
        record.version = self.version.to_string();
        record.request_id = self.request_id.clone();
        record.user_id = self.user_id.clone();
        record.trace_id = self.trace_id.clone();
        for (key, value) in fields {
            record.fields.insert((*key).to_string(), value.clone());
        }
        record
    }

    fn emit(&self, record: LogRecord) {
        self.sink.write(&record);
    }
}

fn error_field(err: &(dyn StdError + 'static)) -> ErrorField {
    match err.downcast_ref::<AppError>() {
        Some(app) => ErrorField::Structured(ErrorRecord::from_app_error(app)),
        None => ErrorField::Plain(err.to_string()),
    }
}
