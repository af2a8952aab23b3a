//! Domain layer for the logging pipeline
//!
//! Configuration, severity and record types. Nothing in here performs I/O.

pub mod errors;
pub mod models;

pub use errors::{ConfigError, LoggingError, MaskRuleError, SeverityError, SinkError};
