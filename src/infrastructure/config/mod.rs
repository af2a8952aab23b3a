//! Configuration management infrastructure
//!
//! - YAML loading of the logging configuration, with fallback to defaults
//! - Application settings from environment variables (figment)

pub mod loader;

pub use loader::{load_logging_config, ConfigLoader, LoadedConfig, DEFAULT_SOURCE};
