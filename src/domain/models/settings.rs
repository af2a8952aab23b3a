use serde::{Deserialize, Serialize};

/// Application environment settings.
///
/// Only `environment` feeds the pipeline (as the `env` default field); the
/// rest is informational and dumped at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppSettings {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_debug")]
    pub debug: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            name: default_name(),
            version: default_version(),
            debug: default_debug(),
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

const fn default_debug() -> bool {
    true
}
