//! The record that flows through the pipeline.

use std::error::Error;
use std::panic::Location;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};

use super::severity::Severity;

/// Where a record was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// Module path of the call site.
    pub module: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Function (or innermost span) the record was produced in.
    pub function: Option<String>,
}

impl Origin {
    /// Origin of a `#[track_caller]` location.
    pub fn caller(location: &Location<'_>) -> Self {
        Self {
            module: None,
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            function: None,
        }
    }

    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// File name without its directory.
    pub fn file_name(&self) -> Option<&str> {
        self.file
            .as_deref()
            .map(|file| Path::new(file).file_name().and_then(|n| n.to_str()).unwrap_or(file))
    }
}

/// Error attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    pub message: String,
    /// Messages of the error's sources, outermost first.
    pub chain: Vec<String>,
    pub debug: Option<String>,
}

impl ExceptionInfo {
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            chain,
            debug: Some(format!("{err:?}")),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chain: Vec::new(),
            debug: None,
        }
    }
}

/// One log call, owned by the pipeline for the duration of a single emit.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub message: String,
    pub severity: Severity,
    /// Bound contextual fields. Owned by this record alone.
    pub extra: Map<String, Value>,
    pub origin: Origin,
    /// `log` target or `tracing` target.
    pub target: String,
    pub exception: Option<ExceptionInfo>,
    pub timestamp: DateTime<Local>,
    pub thread: Option<String>,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            extra: Map::new(),
            origin: Origin::default(),
            target: String::new(),
            exception: None,
            timestamp: Local::now(),
            thread: std::thread::current().name().map(str::to_string),
        }
    }

    #[must_use]
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Logical logger name: module path, then target, then file.
    pub fn name(&self) -> &str {
        self.origin
            .module
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(self.target.as_str()).filter(|t| !t.is_empty()))
            .or(self.origin.file.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(Inner);
    #[derive(Debug)]
    struct Inner;

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }
    impl std::fmt::Display for Inner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "connection reset")
        }
    }
    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }
    impl Error for Inner {}

    #[test]
    fn test_exception_chain() {
        let info = ExceptionInfo::from_error(&Outer(Inner));
        assert_eq!(info.message, "request failed");
        assert_eq!(info.chain, vec!["connection reset".to_string()]);
        assert!(info.debug.is_some());
    }

    #[test]
    fn test_name_precedence() {
        let record = LogRecord::new(Severity::INFO, "x").with_target("hyper::client");
        assert_eq!(record.name(), "hyper::client");

        let record = record.with_origin(Origin {
            module: Some("app::db".to_string()),
            ..Origin::default()
        });
        assert_eq!(record.name(), "app::db");

        let record = LogRecord::new(Severity::INFO, "x").with_origin(Origin {
            file: Some("src/main.rs".to_string()),
            ..Origin::default()
        });
        assert_eq!(record.name(), "src/main.rs");
    }

    #[test]
    fn test_file_name_strips_directories() {
        let origin = Origin {
            file: Some("src/infrastructure/logging/bridge.rs".to_string()),
            ..Origin::default()
        };
        assert_eq!(origin.file_name(), Some("bridge.rs"));
    }
}
