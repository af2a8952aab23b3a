//! Infrastructure layer module
//!
//! - Configuration management (YAML logging config, environment settings)
//! - Logging infrastructure (pipeline, bridges, sinks)

pub mod config;
pub mod logging;
