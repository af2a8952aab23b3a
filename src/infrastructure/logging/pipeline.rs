//! The pipeline every record goes through, and the process-wide active one

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing_appender::non_blocking::WorkerGuard;

use super::filter::{Activation, Propagation};
use super::format::{render_exception, FormatTemplate};
use super::masking::Masker;
use super::reconcile::reconcile_extra;
use super::sink::{Sink, SinkRegistry};
use crate::domain::errors::LoggingError;
use crate::domain::models::{HandlerConfig, LogRecord, LoggingConfig, Severity};

/// Identifies a handler within one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A sink with its level, template and rendering options
pub struct Handler {
    id: HandlerId,
    label: String,
    level: Severity,
    template: FormatTemplate,
    colorize: bool,
    diagnose: bool,
    backtrace: bool,
    sink: Arc<dyn Sink>,
    guard: Mutex<Option<WorkerGuard>>,
}

impl Handler {
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub const fn level(&self) -> Severity {
        self.level
    }

    /// Render a record the way this handler writes it
    pub fn render(&self, record: &LogRecord) -> String {
        let mut rendered = self.template.render(record, self.colorize);
        if let Some(exception) = &record.exception {
            if !self.template.has_exception_field() {
                rendered.push('\n');
                rendered.push_str(&render_exception(exception, self.backtrace, self.diagnose));
            }
        }
        rendered
    }

    fn handle(&self, record: &LogRecord) {
        if !record.severity.admits(self.level) {
            return;
        }
        let rendered = self.render(record);
        if let Err(err) = self.sink.write_record(record, &rendered) {
            report_sink_failure(&self.label, &err);
        }
    }

    fn flush(&self) {
        if let Err(err) = self.sink.flush() {
            report_sink_failure(&self.label, &err);
        }
    }

    /// Flush, then stop the background writer once its queue is written
    fn close(&self) {
        self.flush();
        let guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(guard);
    }

    fn is_enqueued(&self) -> bool {
        self.guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("level", &self.level)
            .field("template", &self.template.as_str())
            .field("enqueued", &self.is_enqueued())
            .finish_non_exhaustive()
    }
}

/// Sink failures cannot go through the pipeline that just failed
fn report_sink_failure(label: &str, err: &std::io::Error) {
    eprintln!("logweave: sink '{label}' failed to write record: {err}");
}

/// A pipeline under construction, with everything that degraded it
#[derive(Debug)]
pub struct PipelineBuild {
    pub pipeline: Pipeline,
    pub issues: Vec<LoggingError>,
}

/// Masking, reconciliation and the handler set for one configuration
pub struct Pipeline {
    config: LoggingConfig,
    source: String,
    masker: Masker,
    default_extra: Map<String, Value>,
    activation: Activation,
    propagation: Propagation,
    handlers: RwLock<Vec<Arc<Handler>>>,
    next_id: AtomicU64,
}

impl Pipeline {
    /// Build a pipeline from a configuration
    ///
    /// Invalid mask patterns and handlers whose sink cannot be built are
    /// skipped and returned as issues.
    pub fn build(
        config: LoggingConfig,
        source: impl Into<String>,
        env: &str,
        registry: &SinkRegistry,
    ) -> PipelineBuild {
        let source = source.into();
        let mut issues = Vec::new();

        let (masker, rule_errors) = Masker::new(config.masking.clone());
        issues.extend(rule_errors.into_iter().map(LoggingError::from));

        let mut default_extra = config.extra.clone();
        default_extra.insert("env".to_string(), Value::from(env));
        default_extra.insert("source".to_string(), Value::from(source.as_str()));

        let pipeline = Self {
            activation: Activation::new(&config.activation),
            propagation: Propagation::new(&config.propagate),
            masker,
            default_extra,
            source,
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            config,
        };

        for (index, handler) in pipeline.config.handlers.iter().enumerate() {
            if let Err(source) = pipeline.add_configured(handler, registry) {
                issues.push(LoggingError::Handler { index, source });
            }
        }

        PipelineBuild { pipeline, issues }
    }

    fn add_configured(
        &self,
        config: &HandlerConfig,
        registry: &SinkRegistry,
    ) -> Result<HandlerId, crate::domain::errors::SinkError> {
        let built = registry.build(&config.sink, config.enqueue)?;
        let colorize = config.colorize.unwrap_or_else(|| built.sink.is_terminal());
        Ok(self.push_handler(|id| Handler {
            id,
            label: config.sink.clone(),
            level: config.level,
            template: FormatTemplate::parse(&config.format),
            colorize,
            diagnose: config.diagnose,
            backtrace: config.backtrace,
            sink: built.sink,
            guard: Mutex::new(built.guard),
        }))
    }

    fn push_handler(&self, make: impl FnOnce(HandlerId) -> Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler = Arc::new(make(id));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
        id
    }

    /// Add a sink outside the configured handler set
    pub fn attach(&self, sink: Arc<dyn Sink>, level: Severity, format: &str) -> HandlerId {
        self.push_handler(|id| Handler {
            id,
            label: format!("attached#{}", id.0),
            level,
            template: FormatTemplate::parse(format),
            colorize: false,
            diagnose: false,
            backtrace: true,
            sink,
            guard: Mutex::new(None),
        })
    }

    /// Remove a handler, draining its queue; returns whether it was present
    pub fn detach(&self, id: HandlerId) -> bool {
        let removed = {
            let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
            let position = handlers.iter().position(|handler| handler.id == id);
            position.map(|index| handlers.remove(index))
        };
        if let Some(handler) = &removed {
            handler.close();
        }
        removed.is_some()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn snapshot(&self) -> Vec<Arc<Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The patch hook: masking, then context reconciliation
    pub fn patch(&self, record: &mut LogRecord) {
        self.masker.apply(record);
        reconcile_extra(record, &self.default_extra);
    }

    /// Patch a record and hand it to every handler whose level admits it
    pub fn emit(&self, mut record: LogRecord) {
        if !self.activation.is_enabled(record.name()) {
            return;
        }
        self.patch(&mut record);
        for handler in self.snapshot() {
            handler.handle(&record);
        }
    }

    /// Flush every handler's sink
    ///
    /// Buffered (`enqueue`) handlers are not drained: their records may
    /// still be queued for the worker thread. [`Pipeline::close`] drains them.
    pub fn flush(&self) {
        for handler in self.snapshot() {
            handler.flush();
        }
    }

    /// Drain and stop every buffered handler
    ///
    /// Blocks until queued records are written. Records emitted afterwards
    /// to a buffered handler fail and are reported on stderr; inline
    /// handlers keep working.
    pub fn close(&self) {
        for handler in self.snapshot() {
            handler.close();
        }
    }

    pub const fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn default_extra(&self) -> &Map<String, Value> {
        &self.default_extra
    }

    pub const fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    pub const fn activation(&self) -> &Activation {
        &self.activation
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source)
            .field("masker", &self.masker)
            .field("default_extra", &self.default_extra)
            .field("handlers", &self.snapshot())
            .finish_non_exhaustive()
    }
}

static ACTIVE: RwLock<Option<Arc<Pipeline>>> = RwLock::new(None);

/// Make `pipeline` the process-wide pipeline, returning the previous one
pub fn install(pipeline: Arc<Pipeline>) -> Option<Arc<Pipeline>> {
    ACTIVE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(pipeline)
}

/// Remove `pipeline` if it is still the active one
pub fn uninstall(pipeline: &Arc<Pipeline>) -> bool {
    let mut active = ACTIVE.write().unwrap_or_else(PoisonError::into_inner);
    if active.as_ref().is_some_and(|current| Arc::ptr_eq(current, pipeline)) {
        active.take();
        true
    } else {
        false
    }
}

/// The process-wide pipeline, if one is installed
pub fn active() -> Option<Arc<Pipeline>> {
    ACTIVE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Send a record through the active pipeline; dropped when there is none
pub fn emit(record: LogRecord) {
    if let Some(pipeline) = active() {
        pipeline.emit(record);
    }
}
