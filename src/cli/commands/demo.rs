//! Implementation of the `logweave demo` command.

use std::error::Error;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Severity;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{
    log_entry_exit, log_exec_time_async, setup_logging_with, CaptureSink, InstrumentOptions,
    SinkRegistry,
};

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Message logged through both APIs; sensitive parts are masked
    #[arg(
        short,
        long,
        default_value = "contact: jane.doe@example.com, card 4111 1111 1111 1111"
    )]
    pub message: String,
}

#[derive(Debug, serde::Serialize)]
pub struct DemoOutput {
    pub source: String,
    pub env: String,
    pub handlers: usize,
    /// Messages as the handlers received them
    pub messages: Vec<String>,
}

impl CommandOutput for DemoOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!(
                "Pipeline from '{}' (env {}) with {} handler(s)",
                self.source, self.env, self.handlers
            ),
            format!("\nEmitted {} record(s):", self.messages.len()),
        ];
        lines.extend(self.messages.iter().map(|message| format!("  - {message}")));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Sink kinds for the demo pipeline
///
/// In JSON mode stdout carries the command's document, so handlers
/// configured for stdout write to stderr instead.
fn sink_registry(mut registry: SinkRegistry, json_mode: bool) -> SinkRegistry {
    if json_mode {
        registry.redirect("stdout", "stderr");
        registry.redirect("ext://sys.stdout", "stderr");
    }
    registry
}

pub async fn execute(
    args: DemoArgs,
    config: Option<&Path>,
    env: &str,
    json_mode: bool,
) -> Result<()> {
    let registry = sink_registry(SinkRegistry::default(), json_mode);
    let handle = setup_logging_with(config, env, &registry);
    let capture = Arc::new(CaptureSink::new());
    let id = handle.attach(capture.clone(), Severity::TRACE, "{message}");

    if let Ok(settings) = ConfigLoader::load_settings() {
        tracing::debug!(
            name = %settings.name,
            version = %settings.version,
            debug = settings.debug,
            "Application settings"
        );
    }

    tracing::info!("{}", args.message);
    tracing::info!(user_id = 42, "Bound context replaces the defaults");
    log::warn!(target: "logweave::demo", "Legacy record: {}", args.message);

    let options = InstrumentOptions::default();
    let _ = log_entry_exit("parse_amount", options, || "42".parse::<u32>());
    log_exec_time_async("wait", options, tokio::time::sleep(Duration::from_millis(5))).await;

    let err = io::Error::new(io::ErrorKind::NotFound, "settings.yaml missing");
    tracing::error!(error = &err as &(dyn Error + 'static), "Demo failure");

    handle.detach(id);
    let result = DemoOutput {
        source: handle.source().to_string(),
        env: env.to_string(),
        handlers: handle.handler_count(),
        messages: capture.messages(),
    };
    handle.shutdown();

    output(&result, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::LogRecord;

    /// Registry whose `stdout` and `stderr` write to files in `dir`
    fn file_backed(dir: &Path) -> SinkRegistry {
        let mut registry = SinkRegistry::default();
        for tag in ["stdout", "stderr"] {
            let path = dir.join(format!("{tag}.log")).display().to_string();
            registry.register(tag, move |_| SinkRegistry::empty().resolve(&path));
        }
        registry
    }

    fn write_line(registry: &SinkRegistry, target: &str) {
        let built = registry.build(target, false).unwrap();
        built
            .sink
            .write_record(&LogRecord::new(Severity::INFO, "x"), target)
            .unwrap();
    }

    #[test]
    fn test_json_mode_moves_stdout_handlers_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let registry = sink_registry(file_backed(dir.path()), true);

        write_line(&registry, "stdout");

        assert!(!dir.path().join("stdout.log").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("stderr.log")).unwrap(),
            "stdout\n"
        );
    }

    #[test]
    fn test_human_mode_keeps_stdout_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let registry = sink_registry(file_backed(dir.path()), false);

        write_line(&registry, "stdout");

        assert_eq!(
            std::fs::read_to_string(dir.path().join("stdout.log")).unwrap(),
            "stdout\n"
        );
        assert!(!dir.path().join("stderr.log").exists());
    }
}
