//! Bridge from the `log` facade into the pipeline
//!
//! Libraries that log through `log` end up formatted, masked and routed the
//! same way as `tracing` events. The call site comes from the `log` record
//! itself, so file, line and module are the caller's and never the bridge's.

use std::sync::{Arc, OnceLock};

use log::kv::{self, VisitSource};
use log::{LevelFilter, Log, Metadata};
use serde_json::{Map, Value};

use super::pipeline::{self, Pipeline};
use crate::domain::models::{ExceptionInfo, LogRecord, Origin, Severity};

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Key-value pairs of a `log` record
#[derive(Default)]
struct KvVisitor {
    fields: Map<String, Value>,
    severity: Option<Severity>,
    exception: Option<ExceptionInfo>,
}

impl<'kvs> VisitSource<'kvs> for KvVisitor {
    fn visit_pair(&mut self, key: kv::Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        match key.as_str() {
            "exception" | "error" if self.exception.is_none() => {
                self.exception = Some(ExceptionInfo::from_message(value.to_string()));
            }
            "severity" => match value.to_string().parse() {
                Ok(severity) => self.severity = Some(severity),
                Err(_) => {
                    self.fields.insert("severity".to_string(), kv_to_json(&value));
                }
            },
            name => {
                self.fields.insert(name.to_string(), kv_to_json(&value));
            }
        }
        Ok(())
    }
}

fn kv_to_json(value: &kv::Value<'_>) -> Value {
    if let Some(flag) = value.to_bool() {
        Value::from(flag)
    } else if let Some(int) = value.to_i64() {
        Value::from(int)
    } else if let Some(uint) = value.to_u64() {
        Value::from(uint)
    } else if let Some(float) = value.to_f64() {
        Value::from(float)
    } else {
        Value::from(value.to_string())
    }
}

/// Name of the innermost `tracing` span the caller is in
fn current_function() -> Option<String> {
    tracing::Span::current()
        .metadata()
        .map(|metadata| metadata.name().to_string())
}

/// Translate a `log` record, keeping its call site
pub fn to_record(record: &log::Record<'_>) -> LogRecord {
    let mut visitor = KvVisitor::default();
    // Our visitor never fails; a failing source only loses its remaining pairs.
    let _ = record.key_values().visit(&mut visitor);

    let origin = Origin {
        module: record.module_path().map(str::to_string),
        file: record.file().map(str::to_string),
        line: record.line(),
        function: current_function(),
    };
    let severity = visitor
        .severity
        .unwrap_or_else(|| Severity::from_legacy(record.level()));

    let mut out = LogRecord::new(severity, record.args().to_string())
        .with_extra(visitor.fields)
        .with_origin(origin)
        .with_target(record.target());
    out.exception = visitor.exception;
    out
}

/// `log::Log` implementation feeding the pipeline
#[derive(Debug, Default)]
pub struct LegacyBridge {
    pipeline: Option<Arc<Pipeline>>,
}

impl LegacyBridge {
    /// Bridge into whichever pipeline is active when a record arrives
    pub const fn new() -> Self {
        Self { pipeline: None }
    }

    /// Bridge into one pipeline regardless of the active one
    pub const fn with_pipeline(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
        }
    }

    /// Register the bridge as the process-wide `log` logger
    ///
    /// Safe to call repeatedly; registration happens once. Returns `false`
    /// when another logger had already claimed the facade.
    pub fn install() -> bool {
        let installed = *INSTALLED.get_or_init(|| {
            let result = log::set_boxed_logger(Box::new(Self::new()));
            if let Err(err) = &result {
                tracing::warn!(error = %err, "Another `log` logger is installed; legacy records will not be captured");
            }
            result.is_ok()
        });
        log::set_max_level(LevelFilter::Trace);
        installed
    }

    fn pipeline(&self) -> Option<Arc<Pipeline>> {
        self.pipeline.clone().or_else(pipeline::active)
    }
}

impl Log for LegacyBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.pipeline().is_some_and(|pipeline| {
            pipeline
                .propagation()
                .admits(metadata.target(), Severity::from_legacy(metadata.level()))
        })
    }

    fn log(&self, record: &log::Record<'_>) {
        let Some(pipeline) = self.pipeline() else {
            return;
        };
        let severity = Severity::from_legacy(record.level());
        if !pipeline.propagation().admits(record.target(), severity) {
            return;
        }
        pipeline.emit(to_record(record));
    }

    fn flush(&self) {
        if let Some(pipeline) = self.pipeline() {
            pipeline.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LoggingConfig, PropagateConfig};
    use crate::infrastructure::logging::sink::{CaptureSink, SinkRegistry};
    use log::Level;

    fn bridge(config: LoggingConfig) -> (LegacyBridge, Arc<CaptureSink>) {
        let pipeline = Arc::new(
            Pipeline::build(config, "default", "test", &SinkRegistry::default()).pipeline,
        );
        let sink = Arc::new(CaptureSink::new());
        pipeline.attach(sink.clone(), Severity::TRACE, "{message}");
        (LegacyBridge::with_pipeline(pipeline), sink)
    }

    fn quiet() -> LoggingConfig {
        LoggingConfig {
            handlers: Vec::new(),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_call_site_is_preserved() {
        let (bridge, sink) = bridge(quiet());
        bridge.log(
            &log::Record::builder()
                .args(format_args!("from a library"))
                .level(Level::Info)
                .target("some_crate::client")
                .module_path(Some("some_crate::client"))
                .file(Some("src/client.rs"))
                .line(Some(88))
                .build(),
        );

        let record = &sink.records()[0];
        assert_eq!(record.message, "from a library");
        assert_eq!(record.severity, Severity::INFO);
        assert_eq!(record.origin.file.as_deref(), Some("src/client.rs"));
        assert_eq!(record.origin.line, Some(88));
        assert_eq!(record.name(), "some_crate::client");
    }

    #[test]
    fn test_levels_translate() {
        let (bridge, sink) = bridge(quiet());
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error] {
            bridge.log(
                &log::Record::builder()
                    .args(format_args!("x"))
                    .level(level)
                    .target("app")
                    .build(),
            );
        }

        let severities: Vec<_> = sink.records().iter().map(|r| r.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::TRACE,
                Severity::DEBUG,
                Severity::INFO,
                Severity::WARNING,
                Severity::ERROR
            ]
        );
    }

    #[test]
    fn test_key_values_are_bound() {
        let (bridge, sink) = bridge(quiet());
        let pairs = ("user_id", 7_i64);
        bridge.log(
            &log::Record::builder()
                .args(format_args!("signed in"))
                .level(Level::Info)
                .target("app")
                .key_values(&pairs)
                .build(),
        );

        let record = &sink.records()[0];
        assert_eq!(record.extra["user_id"], 7);
        assert!(!record.extra.contains_key("env"));
    }

    #[test]
    fn test_error_pair_becomes_exception() {
        let (bridge, sink) = bridge(quiet());
        let pairs = ("error", "connection reset");
        bridge.log(
            &log::Record::builder()
                .args(format_args!("request failed"))
                .level(Level::Error)
                .target("app")
                .key_values(&pairs)
                .build(),
        );

        let record = &sink.records()[0];
        assert_eq!(
            record.exception.as_ref().map(|e| e.message.as_str()),
            Some("connection reset")
        );
        assert_eq!(record.extra["env"], "test");
    }

    #[test]
    fn test_function_is_current_span() {
        let (bridge, sink) = bridge(quiet());
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = tracing::info_span!("refresh_cache");
            let _entered = span.enter();
            bridge.log(
                &log::Record::builder()
                    .args(format_args!("inside"))
                    .level(Level::Info)
                    .target("app")
                    .build(),
            );
        });

        assert_eq!(
            sink.records()[0].origin.function.as_deref(),
            Some("refresh_cache")
        );
    }

    #[test]
    fn test_propagation_floor_applies() {
        let mut config = quiet();
        config.propagate = PropagateConfig {
            enabled: true,
            level_to_pass: Some(Severity::WARNING),
            loggers_name: vec!["hyper".to_string()],
        };
        let (bridge, sink) = bridge(config);

        for level in [Level::Info, Level::Warn] {
            bridge.log(
                &log::Record::builder()
                    .args(format_args!("pool"))
                    .level(level)
                    .target("hyper::client")
                    .build(),
            );
        }
        bridge.log(
            &log::Record::builder()
                .args(format_args!("mine"))
                .level(Level::Debug)
                .target("app")
                .build(),
        );

        let severities: Vec<_> = sink.records().iter().map(|r| r.severity).collect();
        assert_eq!(severities, vec![Severity::WARNING, Severity::DEBUG]);
        assert!(!bridge.enabled(
            &log::Metadata::builder()
                .level(Level::Info)
                .target("hyper")
                .build()
        ));
    }
}
