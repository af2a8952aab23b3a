use std::path::Path;

use figment::providers::{Env, Serialized};
use figment::Figment;

use crate::domain::errors::ConfigError;
use crate::domain::models::{AppSettings, LoggingConfig};

/// Source tag used when no config file contributed to the pipeline.
pub const DEFAULT_SOURCE: &str = "default";

/// A logging configuration together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: LoggingConfig,
    /// Config file name, or [`DEFAULT_SOURCE`] when defaults were used
    pub source: String,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the logging configuration, falling back to built-in defaults
    ///
    /// Never fails: a missing path, an unreadable or malformed file, or a
    /// config that does not validate all yield `LoggingConfig::default()`.
    pub fn load_logging(path: Option<&Path>) -> LoadedConfig {
        let Some(path) = path else {
            return LoadedConfig {
                config: LoggingConfig::default(),
                source: DEFAULT_SOURCE.to_string(),
            };
        };

        match Self::try_load_logging(path) {
            Ok(config) => LoadedConfig {
                config,
                source: source_name(path),
            },
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "logging config unusable, using defaults"
                );
                LoadedConfig {
                    config: LoggingConfig::default(),
                    source: DEFAULT_SOURCE.to_string(),
                }
            }
        }
    }

    /// Load the logging configuration from a YAML file
    ///
    /// Top-level sections the file leaves out keep their defaults. An empty
    /// document is the default configuration.
    pub fn try_load_logging(path: impl AsRef<Path>) -> Result<LoggingConfig, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if contents.trim().is_empty() {
            return Ok(LoggingConfig::default());
        }

        let config: LoggingConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a logging configuration after loading
    pub fn validate(config: &LoggingConfig) -> Result<(), ConfigError> {
        if config.masking.enabled && config.masking.default_mask.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "masking.default_mask cannot be empty while masking is enabled".to_string(),
            ));
        }

        for (index, handler) in config.handlers.iter().enumerate() {
            if handler.sink.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "handlers[{index}].sink cannot be empty"
                )));
            }
        }

        for (name, _) in &config.activation {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "activation entries need a module name".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Load application settings
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. Environment variables (`APP_*` prefix)
    pub fn load_settings() -> Result<AppSettings, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(AppSettings::default()))
            .merge(Env::prefixed("APP_"))
            .extract()
            .map_err(|err| ConfigError::Settings(Box::new(err)))
    }
}

/// Load the logging configuration, falling back to defaults on any error
pub fn load_logging_config(path: Option<&Path>) -> LoggingConfig {
    ConfigLoader::load_logging(path).config
}

fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
