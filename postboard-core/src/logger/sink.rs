//! Destinations for log records

use super::record::{Level, LogRecord};
use parking_lot::Mutex;
use std::fmt;

/// Receives every record a [`super::Logger`] emits
pub trait LogSink: Send + Sync + fmt::Debug {
    fn write(&self, record: &LogRecord);
}

/// Forwards records to the `tracing` subscriber installed by
/// [`crate::observability::init_tracing`].
///
/// Structured parts (the error sub-record and extra fields) are rendered as
/// JSON strings because tracing field names are fixed at compile time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

macro_rules! emit_event {
    ($lvl:ident, $record:expr, $error:expr, $fields:expr, $source:expr) => {
        tracing::event!(
            tracing::Level::$lvl,
            service = %$record.service,
            version = %$record.version,
            request_id = $record.request_id.as_deref(),
            user_id = $record.user_id.as_deref(),
            trace_id = $record.trace_id.as_deref(),
            method = $record.method.as_deref(),
            path = $record.path.as_deref(),
            status_code = $record.status_code,
            duration = $record.duration.as_deref(),
            error = $error,
            context = $fields,
            source = $source,
            "{}",
            $record.message
        )
    };
}

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) {
        let error = record.error.as_ref().map(|err| {
            serde_json::to_string(err).unwrap_or_else(|_| format!("{:?}", err))
        });
        let fields = if record.fields.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(record.fields.clone()).to_string())
        };
        let source = record.source.as_ref().map(|s| s.to_string());

        let error = error.as_deref();
        let fields = fields.as_deref();
        let source = source.as_deref();

        match record.level {
            Level::Debug => emit_event!(DEBUG, record, error, fields, source),
            Level::Info => emit_event!(INFO, record, error, fields, source),
            Level::Warn => emit_event!(WARN, record, error, fields, source),
            Level::Error | Level::Fatal => emit_event!(ERROR, record, error, fields, source),
        }
    }
}

/// Keeps records in memory for inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records whose message equals `message`
    pub fn find(&self, message: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.message == message)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}
