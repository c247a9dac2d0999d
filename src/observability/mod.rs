//! Structured logging for the upload flow.
//!
//! Components never log through process-wide state. Each one receives an
//! `Arc<dyn Logger>` at construction time; [`TracingLogger`] is the default and
//! forwards to the `tracing` ecosystem.

use serde_json::Value;
use std::sync::Arc;

/// Log severity, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational messages and above.
    Info,
    /// Debug output and above.
    Debug,
}

/// Logger trait for structured logging.
pub trait Logger: Send + Sync {
    /// Log a debug message with structured context.
    fn debug(&self, message: &str, fields: Value);

    /// Log an info message with structured context.
    fn info(&self, message: &str, fields: Value);

    /// Log a warning message with structured context.
    fn warn(&self, message: &str, fields: Value);

    /// Log an error message with structured context.
    fn error(&self, message: &str, fields: Value);
}

/// Field names whose values never reach a log line.
const SENSITIVE_KEYS: &[&str] = &[
    "token",
    "access_token",
    "assertion",
    "private_key",
    "authorization",
    "secret",
];

/// Logger that emits `tracing` events with redacted JSON context.
pub struct TracingLogger {
    name: String,
    level: LogLevel,
}

impl TracingLogger {
    /// Create a new logger with the given component name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: LogLevel::Info,
        }
    }

    /// Set the minimum log level for this logger.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Shared default logger for the uploader.
    pub fn shared() -> Arc<dyn Logger> {
        Arc::new(Self::new("drive_uploader"))
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level
    }
}

/// Replaces sensitive values in `fields`, recursing into nested objects.
pub fn redact(mut fields: Value) -> Value {
    if let Some(obj) = fields.as_object_mut() {
        for (key, value) in obj.iter_mut() {
            if SENSITIVE_KEYS.contains(&key.as_str()) {
                *value = Value::String("***REDACTED***".to_string());
            } else if value.is_object() {
                *value = redact(value.take());
            }
        }
    }
    fields
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str, fields: Value) {
        if self.enabled(LogLevel::Debug) {
            let fields = redact(fields);
            tracing::debug!(logger = %self.name, fields = %fields, "{}", message);
        }
    }

    fn info(&self, message: &str, fields: Value) {
        if self.enabled(LogLevel::Info) {
            let fields = redact(fields);
            tracing::info!(logger = %self.name, fields = %fields, "{}", message);
        }
    }

    fn warn(&self, message: &str, fields: Value) {
        if self.enabled(LogLevel::Warn) {
            let fields = redact(fields);
            tracing::warn!(logger = %self.name, fields = %fields, "{}", message);
        }
    }

    fn error(&self, message: &str, fields: Value) {
        if self.enabled(LogLevel::Error) {
            let fields = redact(fields);
            tracing::error!(logger = %self.name, fields = %fields, "{}", message);
        }
    }
}
