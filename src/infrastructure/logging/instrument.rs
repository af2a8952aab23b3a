//! Entry, exit and timing records around a call
//!
//! Records carry the caller's file and line (through `#[track_caller]`)
//! and the given name as their function, and go to the active pipeline.

use std::fmt::Debug;
use std::future::Future;
use std::panic::Location;
use std::time::{Duration, Instant};

use super::pipeline;
use crate::domain::models::{LogRecord, Origin, Severity};

/// Which records to produce, and at what severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentOptions {
    pub entry: bool,
    pub exit: bool,
    pub level: Severity,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            entry: true,
            exit: true,
            level: Severity::DEBUG,
        }
    }
}

struct Probe {
    name: String,
    options: InstrumentOptions,
    origin: Origin,
}

impl Probe {
    fn new(name: &str, options: InstrumentOptions, caller: &Location<'_>) -> Self {
        Self {
            name: name.to_string(),
            options,
            origin: Origin::caller(caller).with_function(name),
        }
    }

    fn record(&self, message: String) -> LogRecord {
        LogRecord::new(self.options.level, message).with_origin(self.origin.clone())
    }

    fn entry_record(&self) -> Option<LogRecord> {
        self.options
            .entry
            .then(|| self.record(format!("Entering '{}'", self.name)))
    }

    fn exit_record(&self, result: &impl Debug) -> Option<LogRecord> {
        self.options
            .exit
            .then(|| self.record(format!("Exiting '{}' (result={result:?})", self.name)))
    }

    fn timing_record(&self, elapsed: Duration) -> LogRecord {
        self.record(format!(
            "Execution time for '{}': {:.6}s",
            self.name,
            elapsed.as_secs_f64()
        ))
    }

    fn entry(&self) {
        if let Some(record) = self.entry_record() {
            pipeline::emit(record);
        }
    }

    fn exit(&self, result: &impl Debug) {
        if let Some(record) = self.exit_record(result) {
            pipeline::emit(record);
        }
    }

    fn timing(&self, elapsed: Duration) {
        pipeline::emit(self.timing_record(elapsed));
    }
}

/// Run `f`, logging entry and exit with its result
#[track_caller]
pub fn log_entry_exit<R, F>(name: &str, options: InstrumentOptions, f: F) -> R
where
    R: Debug,
    F: FnOnce() -> R,
{
    let probe = Probe::new(name, options, Location::caller());
    probe.entry();
    let result = f();
    probe.exit(&result);
    result
}

/// Run `f`, logging entry, elapsed time and exit
#[track_caller]
pub fn log_exec_time<R, F>(name: &str, options: InstrumentOptions, f: F) -> R
where
    R: Debug,
    F: FnOnce() -> R,
{
    let probe = Probe::new(name, options, Location::caller());
    probe.entry();
    let start = Instant::now();
    let result = f();
    probe.timing(start.elapsed());
    probe.exit(&result);
    result
}

/// [`log_entry_exit`] for a future; entry is logged on first poll
#[track_caller]
pub fn log_entry_exit_async<F>(
    name: &str,
    options: InstrumentOptions,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
    F::Output: Debug,
{
    let probe = Probe::new(name, options, Location::caller());
    async move {
        probe.entry();
        let result = future.await;
        probe.exit(&result);
        result
    }
}

/// [`log_exec_time`] for a future; time is measured from first poll
#[track_caller]
pub fn log_exec_time_async<F>(
    name: &str,
    options: InstrumentOptions,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
    F::Output: Debug,
{
    let probe = Probe::new(name, options, Location::caller());
    async move {
        probe.entry();
        let start = Instant::now();
        let result = future.await;
        probe.timing(start.elapsed());
        probe.exit(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn probe(options: InstrumentOptions) -> Probe {
        Probe::new("load_user", options, Location::caller())
    }

    #[test]
    fn test_messages() {
        let probe = probe(InstrumentOptions::default());

        assert_eq!(probe.entry_record().unwrap().message, "Entering 'load_user'");
        assert_eq!(
            probe.exit_record(&Some(3)).unwrap().message,
            "Exiting 'load_user' (result=Some(3))"
        );
        assert_eq!(
            probe.timing_record(Duration::from_millis(1500)).message,
            "Execution time for 'load_user': 1.500000s"
        );
    }

    #[test]
    fn test_origin_is_the_caller() {
        let line = line!() + 1;
        let probe = probe(InstrumentOptions::default());
        let record = probe.entry_record().unwrap();

        assert_eq!(record.origin.line, Some(line));
        assert_eq!(record.origin.function.as_deref(), Some("load_user"));
        assert!(record.origin.file.as_deref().unwrap().ends_with("instrument.rs"));
        assert_eq!(record.severity, Severity::DEBUG);
    }

    #[test]
    fn test_disabled_entry_and_exit() {
        let probe = probe(InstrumentOptions {
            entry: false,
            exit: false,
            level: Severity::INFO,
        });
        assert!(probe.entry_record().is_none());
        assert!(probe.exit_record(&()).is_none());
        assert_eq!(probe.timing_record(Duration::ZERO).severity, Severity::INFO);
    }

    #[test]
    fn test_result_is_returned() {
        assert_eq!(log_entry_exit("add", InstrumentOptions::default(), || 2 + 2), 4);
        assert_eq!(log_exec_time("add", InstrumentOptions::default(), || "ok"), "ok");
    }

    #[tokio::test]
    async fn test_async_result_is_returned() {
        let value = log_exec_time_async("fetch", InstrumentOptions::default(), async { 7 }).await;
        assert_eq!(value, 7);
        let value =
            log_entry_exit_async("fetch", InstrumentOptions::default(), async { "done" }).await;
        assert_eq!(value, "done");
    }
}
