pub mod config;
pub mod record;
pub mod settings;
pub mod severity;

pub use config::{
    HandlerConfig, LoggingConfig, MaskPatterns, MaskingConfig, PropagateConfig, DEFAULT_FORMAT,
};
pub use record::{ExceptionInfo, LogRecord, Origin};
pub use settings::AppSettings;
pub use severity::{Level, Severity};
