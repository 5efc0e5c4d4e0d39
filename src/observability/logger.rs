//! Structured logger for searchd
//!
//! - One log call = one event
//! - Explicit severity levels
//! - Fields rendered as a JSON object with deterministic key ordering
//! - Emitted through `tracing`; installing a subscriber is the embedder's job

use std::fmt;

use serde_json::{Map, Value};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Data loss or an engine that can no longer make progress
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Facade over `tracing` that keeps event names and field sets uniform.
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields.
    ///
    /// Fields are rendered in alphabetical key order.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let rendered = Self::render_fields(fields);
        match severity {
            Severity::Trace => {
                tracing::trace!(target: "searchd", event, severity = severity.as_str(), fields = %rendered)
            }
            Severity::Info => {
                tracing::info!(target: "searchd", event, severity = severity.as_str(), fields = %rendered)
            }
            Severity::Warn => {
                tracing::warn!(target: "searchd", event, severity = severity.as_str(), fields = %rendered)
            }
            Severity::Error | Severity::Fatal => {
                tracing::error!(target: "searchd", event, severity = severity.as_str(), fields = %rendered)
            }
        }
    }

    /// Render an event as a single JSON line.
    pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut object = Map::new();
        object.insert("event".to_string(), Value::String(event.to_string()));
        object.insert(
            "severity".to_string(),
            Value::String(severity.as_str().to_string()),
        );
        for (key, value) in fields {
            object.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        Value::Object(object).to_string()
    }

    fn render_fields(fields: &[(&str, &str)]) -> String {
        let mut object = Map::new();
        for (key, value) in fields {
            object.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        Value::Object(object).to_string()
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_render_is_json() {
        let output = Logger::render(Severity::Info, "DOMAIN_CREATED", &[("key", "default")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "DOMAIN_CREATED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["key"], "default");
    }

    #[test]
    fn test_render_deterministic_ordering() {
        let first = Logger::render(
            Severity::Info,
            "TEST",
            &[("zebra", "1"), ("apple", "2"), ("mango", "3")],
        );
        let second = Logger::render(
            Severity::Info,
            "TEST",
            &[("mango", "3"), ("zebra", "1"), ("apple", "2")],
        );
        assert_eq!(first, second);
        assert!(first.find("apple").unwrap() < first.find("zebra").unwrap());
    }

    #[test]
    fn test_render_escapes_special_chars() {
        let output = Logger::render(Severity::Warn, "TEST", &[("value", "a \"b\"\nc")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["value"], "a \"b\"\nc");
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_log_without_subscriber() {
        Logger::info("TEST", &[("a", "1")]);
        Logger::error("TEST", &[]);
    }
}
