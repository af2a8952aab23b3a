//! Implementation of the `logweave show-settings` command.

use anyhow::{Context, Result};

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::AppSettings;
use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, serde::Serialize)]
pub struct SettingsOutput {
    #[serde(flatten)]
    pub settings: AppSettings,
}

impl CommandOutput for SettingsOutput {
    fn to_human(&self) -> String {
        [
            format!("environment: {}", self.settings.environment),
            format!("name:        {}", self.settings.name),
            format!("version:     {}", self.settings.version),
            format!("debug:       {}", self.settings.debug),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(json_mode: bool) -> Result<()> {
    let settings = ConfigLoader::load_settings().context("Failed to load settings")?;
    output(&SettingsOutput { settings }, json_mode);
    Ok(())
}
