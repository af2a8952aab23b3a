//! Error types for the logging pipeline.
//!
//! None of these ever reach code that emits log records: every failure on
//! the emit path is recovered locally. They surface from setup and from the
//! explicit `try_*` loaders.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read logging config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse logging config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid logging config: {0}")]
    ValidationFailed(String),

    #[error("Failed to load settings: {0}")]
    Settings(#[from] Box<figment::Error>),
}

/// A severity name or number that could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeverityError {
    #[error("Unknown severity: {0}")]
    Unknown(String),
}

/// A masking rule whose pattern does not compile.
#[derive(Debug, Error)]
#[error("Invalid mask pattern '{name}': {source}")]
pub struct MaskRuleError {
    pub name: String,
    #[source]
    pub source: regex::Error,
}

/// Errors raised while resolving a handler's sink target.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("No sink registered for target '{0}'")]
    UnknownKind(String),

    #[error("Failed to open sink '{target}': {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },
}

/// Anything that degraded a pipeline while it was being built.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    MaskRule(#[from] MaskRuleError),

    #[error("Handler #{index} skipped: {source}")]
    Handler {
        index: usize,
        #[source]
        source: SinkError,
    },
}
