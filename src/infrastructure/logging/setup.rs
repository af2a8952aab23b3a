//! Process-wide logging setup

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::bridge::LegacyBridge;
use super::layer::PipelineLayer;
use super::pipeline::{self, HandlerId, Pipeline, PipelineBuild};
use super::sink::{Sink, SinkRegistry};
use crate::domain::models::{LoggingConfig, Severity};
use crate::infrastructure::config::{ConfigLoader, LoadedConfig};

static SETUP_LOCK: Mutex<()> = Mutex::new(());
static LAYER_INSTALLED: OnceLock<bool> = OnceLock::new();

/// Configure process-wide logging from a YAML file
///
/// Never fails: a missing or invalid file falls back to the default
/// configuration, and handlers that cannot be built are skipped with a
/// warning. Calling it again replaces the previous pipeline, draining its
/// buffered handlers; records are never duplicated.
///
/// # Arguments
/// * `config_path` - YAML logging configuration, or `None` for defaults
/// * `env` - Deployment environment, bound to every record as `env`
pub fn setup_logging(config_path: Option<&Path>, env: &str) -> PipelineHandle {
    setup_logging_with(config_path, env, &SinkRegistry::default())
}

/// [`setup_logging`] with a custom sink registry
pub fn setup_logging_with(
    config_path: Option<&Path>,
    env: &str,
    registry: &SinkRegistry,
) -> PipelineHandle {
    let _setup = SETUP_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    let LoadedConfig { config, source } = ConfigLoader::load_logging(config_path);
    let PipelineBuild { pipeline, issues } = Pipeline::build(config, source, env, registry);
    let pipeline = Arc::new(pipeline);

    LegacyBridge::install();
    install_layer();

    if let Some(previous) = pipeline::install(Arc::clone(&pipeline)) {
        previous.close();
    }

    for issue in &issues {
        tracing::warn!(error = %issue, "Logging configuration degraded");
    }
    tracing::debug!(
        config_source = pipeline.source(),
        handlers = pipeline.handler_count(),
        "Logging pipeline installed"
    );

    PipelineHandle { pipeline }
}

/// Install [`PipelineLayer`] as the global `tracing` subscriber, once
///
/// `RUST_LOG` narrows which `tracing` events reach the pipeline; handler
/// levels apply after that.
fn install_layer() -> bool {
    *LAYER_INSTALLED.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::TRACE.into())
            .from_env_lossy();
        let subscriber =
            tracing_subscriber::registry().with(PipelineLayer::new().with_filter(filter));

        match tracing::subscriber::set_global_default(subscriber) {
            Ok(()) => true,
            Err(err) => {
                eprintln!("logweave: tracing events will not reach the pipeline: {err}");
                false
            }
        }
    })
}

/// Handle to the pipeline installed by [`setup_logging`]
///
/// Dropping the handle leaves the pipeline active.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    pipeline: Arc<Pipeline>,
}

impl PipelineHandle {
    /// Add a sink, e.g. a [`CaptureSink`](super::sink::CaptureSink) in tests
    pub fn attach(&self, sink: Arc<dyn Sink>, level: Severity, format: &str) -> HandlerId {
        self.pipeline.attach(sink, level, format)
    }

    pub fn detach(&self, id: HandlerId) -> bool {
        self.pipeline.detach(id)
    }

    pub fn config(&self) -> &LoggingConfig {
        self.pipeline.config()
    }

    /// Config file name, or `default`
    pub fn source(&self) -> &str {
        self.pipeline.source()
    }

    pub fn default_extra(&self) -> &Map<String, Value> {
        self.pipeline.default_extra()
    }

    pub fn handler_count(&self) -> usize {
        self.pipeline.handler_count()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Whether this handle's pipeline is still the process-wide one
    pub fn is_active(&self) -> bool {
        pipeline::active().is_some_and(|active| Arc::ptr_eq(&active, &self.pipeline))
    }

    /// Flush the handlers' sinks
    ///
    /// Does not drain buffered (`enqueue`) handlers; use
    /// [`shutdown`](Self::shutdown) before exit to get every queued record out.
    pub fn flush(&self) {
        self.pipeline.flush();
    }

    /// Deactivate the pipeline if no later setup replaced it, then drain
    /// its buffered handlers
    pub fn shutdown(self) {
        let _setup = SETUP_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        pipeline::uninstall(&self.pipeline);
        self.pipeline.close();
    }
}
