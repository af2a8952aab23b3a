//! Common test utilities for integration tests
//!
//! The pipeline, the `log` logger and the `tracing` subscriber are process
//! globals, so every test that sets up logging holds [`global_lock`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use logweave::{CaptureSink, HandlerId, PipelineHandle, Severity};
use tempfile::TempDir;

static GLOBAL: Mutex<()> = Mutex::new(());

/// Serialize tests that touch process-wide logging state
pub fn global_lock() -> MutexGuard<'static, ()> {
    GLOBAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write a YAML logging config into `dir`
pub fn write_config(dir: &Path, name: &str, yaml: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, yaml).expect("Failed to write config");
    path
}

/// Config without any output handlers, so tests only see their capture sink
#[allow(dead_code)]
pub const QUIET: &str = "handlers: []\n";

/// Attach a capture sink that sees every record as its bare message
pub fn capture(handle: &PipelineHandle) -> (Arc<CaptureSink>, HandlerId) {
    let sink = Arc::new(CaptureSink::new());
    let id = handle.attach(sink.clone(), Severity::TRACE, "{message}");
    (sink, id)
}
