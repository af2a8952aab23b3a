//! `tracing` integration: events become records of the pipeline

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::pipeline::{self, Pipeline};
use crate::domain::models::{ExceptionInfo, LogRecord, Origin, Severity};

/// Fields recorded on a span, stored in its extensions
#[derive(Debug, Default)]
struct SpanFields(Map<String, Value>);

/// Collects event fields
///
/// `message` becomes the record message, `severity` overrides the event
/// level, `exception` (or any error value) becomes the attached error.
/// Everything else is bound context.
#[derive(Default)]
struct FieldVisitor {
    fields: Map<String, Value>,
    message: Option<String>,
    severity: Option<Severity>,
    exception: Option<ExceptionInfo>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" => self.message = Some(into_text(value)),
            "severity" => match severity_of(&value) {
                Some(severity) => self.severity = Some(severity),
                None => {
                    self.fields.insert("severity".to_string(), value);
                }
            },
            "exception" if self.exception.is_none() => {
                self.exception = Some(ExceptionInfo::from_message(into_text(value)));
            }
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

fn into_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn severity_of(value: &Value) -> Option<Severity> {
    match value {
        Value::String(name) => name.parse().ok(),
        Value::Number(no) => no
            .as_u64()
            .and_then(|no| u32::try_from(no).ok())
            .map(Severity::from_number),
        _ => None,
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exception.is_none() && field.name() != "message" {
            self.exception = Some(ExceptionInfo::from_error(value));
        } else {
            self.insert(field, Value::from(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

/// Span fields are plain context; nothing is interpreted
struct SpanVisitor<'a>(&'a mut Map<String, Value>);

impl Visit for SpanVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{value:?}")));
    }
}

#[derive(Debug, Clone)]
enum Destination {
    Active,
    Fixed(Arc<Pipeline>),
}

/// Layer that routes every `tracing` event through a pipeline
///
/// Fields of enclosing spans are bound to the record, outermost span first,
/// with the event's own fields on top. The innermost span's name is used as
/// the record's function.
#[derive(Debug, Clone)]
pub struct PipelineLayer {
    destination: Destination,
}

impl PipelineLayer {
    /// Route to whichever pipeline is active when the event fires
    pub const fn new() -> Self {
        Self {
            destination: Destination::Active,
        }
    }

    /// Route to one pipeline regardless of the active one
    pub const fn with_pipeline(pipeline: Arc<Pipeline>) -> Self {
        Self {
            destination: Destination::Fixed(pipeline),
        }
    }

    fn emit(&self, record: LogRecord) {
        match &self.destination {
            Destination::Active => pipeline::emit(record),
            Destination::Fixed(pipeline) => pipeline.emit(record),
        }
    }
}

impl Default for PipelineLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Map::new();
        attrs.record(&mut SpanVisitor(&mut fields));
        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            values.record(&mut SpanVisitor(fields));
        } else {
            let mut fields = Map::new();
            values.record(&mut SpanVisitor(&mut fields));
            extensions.insert(SpanFields(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut extra = Map::new();
        let mut function = None;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    extra.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                function = Some(span.name());
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        extra.append(&mut visitor.fields);

        let severity = visitor
            .severity
            .unwrap_or_else(|| Severity::from_tracing(metadata.level()));
        let origin = Origin {
            module: metadata.module_path().map(str::to_string),
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
            function: function.map(str::to_string),
        };

        let mut record = LogRecord::new(severity, visitor.message.unwrap_or_default())
            .with_extra(extra)
            .with_origin(origin)
            .with_target(metadata.target());
        record.exception = visitor.exception;

        self.emit(record);
    }
}
