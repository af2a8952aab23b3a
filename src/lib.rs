//! Logweave - unified structured logging for a process
//!
//! Every record, whether it comes from `tracing` or from a library using the
//! `log` facade, goes through one pipeline: sensitive values are masked,
//! default context is reconciled with the caller's fields, and configured
//! handlers format and write it.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): records, severities, configuration models, errors
//! - **Infrastructure Layer** (`infrastructure`): config loading, the pipeline and its integrations
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let handle = logweave::setup_logging(Some(Path::new("logging.yaml")), "staging");
//! tracing::info!(user_id = 7, "signed in");
//! log::warn!("from a library");
//! handle.shutdown();
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigError, LoggingError, SeverityError, SinkError};
pub use domain::models::{
    AppSettings, ExceptionInfo, HandlerConfig, Level, LogRecord, LoggingConfig, MaskingConfig,
    Origin, PropagateConfig, Severity,
};
pub use infrastructure::config::{load_logging_config, ConfigLoader};
pub use infrastructure::logging::{
    emit, log_entry_exit, log_entry_exit_async, log_exec_time, log_exec_time_async,
    setup_logging, setup_logging_with, CaptureSink, HandlerId, InstrumentOptions, LegacyBridge,
    PipelineHandle, PipelineLayer, Sink, SinkRegistry,
};
