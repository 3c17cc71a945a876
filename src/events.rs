//! Core event types for the ticket logger
//!
//! This module defines the log event consumed by the submission engine:
//! its severity, message and the loosely typed context bag that ends up in
//! the ticket description.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::panic::Location;
use std::str::FromStr;
use thiserror::Error;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Extra data attached to a log call
///
/// Keys keep their insertion order, which is also the order in which they
/// are rendered into ticket descriptions.
pub type Context = serde_json::Map<String, Value>;

/// Context key under which captured error details are stored
pub const EXCEPTION_KEY: &str = "exception";

/// Standard leveled-logging severities, least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    /// Lowercase name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::Alert => "alert",
            Severity::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Error returned when a severity name is not recognized
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown severity '{0}'")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "notice" => Ok(Severity::Notice),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            "critical" | "crit" => Ok(Severity::Critical),
            "alert" => Ok(Severity::Alert),
            "emergency" | "emerg" => Ok(Severity::Emergency),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Severity::Error,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug | log::Level::Trace => Severity::Debug,
        }
    }
}

/// A single log/error event handed to the submission engine
///
/// Events are transient: the engine derives a summary and a description
/// from them and never stores them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
    /// How severe the event is
    pub severity: Severity,
    /// The log message, used to derive the ticket summary
    pub message: String,
    /// Extra key-value data rendered into the ticket description
    #[serde(default)]
    pub context: Context,
    /// Session data supplied by hosts that have one (e.g. a web request)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Context>,
}

impl ErrorEvent {
    /// Create an event with an empty context
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            context: Context::new(),
            session: None,
        }
    }

    /// Add a context entry, keeping insertion order
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach session data
    pub fn with_session(mut self, session: Context) -> Self {
        self.session = Some(session);
        self
    }

    /// Capture an error value into the context under [`EXCEPTION_KEY`]
    ///
    /// The caller's source location is recorded as `file` and `line`. Which
    /// of the captured fields reach the ticket is decided by the formatter's
    /// accessor whitelist.
    #[track_caller]
    pub fn with_exception(mut self, err: &(dyn std::error::Error + 'static)) -> Self {
        let details = exception_details(err, Location::caller());
        self.context.insert(EXCEPTION_KEY.to_string(), details);
        self
    }
}

/// Collect the inspectable fields of an error value
fn exception_details(err: &(dyn std::error::Error + 'static), location: &Location<'_>) -> Value {
    let mut details = Context::new();
    details.insert("message".to_string(), Value::String(err.to_string()));

    let mut sources = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        sources.push(Value::String(source.to_string()));
        current = source.source();
    }
    details.insert("sources".to_string(), Value::Array(sources));

    details.insert("debug".to_string(), Value::String(format!("{:?}", err)));
    details.insert(
        "file".to_string(),
        Value::String(location.file().to_string()),
    );
    details.insert("line".to_string(), Value::from(location.line()));

    let backtrace = std::backtrace::Backtrace::capture();
    if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
        details.insert("trace".to_string(), Value::String(backtrace.to_string()));
    }

    Value::Object(details)
}
