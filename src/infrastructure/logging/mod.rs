//! Logging infrastructure
//!
//! One pipeline for every record in the process:
//! - `tracing` events through [`PipelineLayer`]
//! - `log` records through [`LegacyBridge`]
//! - masking and context reconciliation before any handler sees a record
//! - handlers writing to stdout, stderr, files or custom sinks

pub mod bridge;
pub mod filter;
pub mod format;
pub mod instrument;
pub mod layer;
pub mod masking;
pub mod pipeline;
pub mod reconcile;
pub mod setup;
pub mod sink;

pub use bridge::LegacyBridge;
pub use filter::{Activation, Propagation};
pub use format::{render_exception, FormatTemplate};
pub use instrument::{
    log_entry_exit, log_entry_exit_async, log_exec_time, log_exec_time_async, InstrumentOptions,
};
pub use layer::PipelineLayer;
pub use masking::{apply_masking, mask_extra, mask_message, MaskRules, Masker};
pub use pipeline::{emit, Handler, HandlerId, Pipeline, PipelineBuild};
pub use reconcile::reconcile_extra;
pub use setup::{setup_logging, setup_logging_with, PipelineHandle};
pub use sink::{BuiltSink, CaptureSink, Captured, Sink, SinkRegistry, SinkTarget, WriterSink};
