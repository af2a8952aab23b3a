//! Command-line interface
//!
//! Inspect the settings the pipeline would use and exercise it end to end.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

/// Print a command error and exit with a failure status
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let value = serde_json::json!({ "success": false, "error": format!("{err:#}") });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
