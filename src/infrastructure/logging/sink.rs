//! Output sinks and the registry that builds them from handler targets

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};

use crate::domain::errors::SinkError;
use crate::domain::models::LogRecord;

/// Destination for rendered records
///
/// Implementations must be internally synchronized; they are shared by
/// every thread that emits.
pub trait Sink: Send + Sync {
    /// Write one rendered record
    fn write_record(&self, record: &LogRecord, rendered: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Whether output lands on an interactive terminal
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Sink over any `io::Write`, one line per record
pub struct WriterSink {
    label: String,
    writer: Mutex<Box<dyn Write + Send>>,
    terminal: bool,
}

impl WriterSink {
    pub fn new(label: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            label: label.into(),
            writer: Mutex::new(Box::new(writer)),
            terminal: false,
        }
    }

    #[must_use]
    pub const fn terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Sink for WriterSink {
    fn write_record(&self, _record: &LogRecord, rendered: &str) -> io::Result<()> {
        let mut line = String::with_capacity(rendered.len() + 1);
        line.push_str(rendered);
        line.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }

    fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}

impl fmt::Debug for WriterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink")
            .field("label", &self.label)
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}

/// A record captured by [`CaptureSink`]
#[derive(Debug, Clone)]
pub struct Captured {
    pub record: LogRecord,
    pub rendered: String,
}

/// In-memory sink for assertions
#[derive(Debug, Default)]
pub struct CaptureSink {
    captured: Mutex<Vec<Captured>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.lock().clone()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().iter().map(|c| c.record.clone()).collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(|c| c.rendered.clone()).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|c| c.record.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Captured>> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sink for CaptureSink {
    fn write_record(&self, record: &LogRecord, rendered: &str) -> io::Result<()> {
        self.lock().push(Captured {
            record: record.clone(),
            rendered: rendered.to_string(),
        });
        Ok(())
    }
}

/// A resolved sink target, before buffering is decided
pub struct SinkTarget {
    pub writer: Box<dyn Write + Send>,
    pub terminal: bool,
}

impl SinkTarget {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            terminal: false,
        }
    }
}

/// A sink built for a handler, with the guard of its background writer
pub struct BuiltSink {
    pub sink: Arc<dyn Sink>,
    pub guard: Option<WorkerGuard>,
}

/// Constructor for a sink kind; receives the target with its kind prefix removed
pub type SinkFactory = Arc<dyn Fn(&str) -> Result<SinkTarget, SinkError> + Send + Sync>;

/// Maps sink-kind tags to constructors
///
/// Resolution order for a target: exact tag, then the longest matching
/// scheme prefix, then a file path.
#[derive(Clone)]
pub struct SinkRegistry {
    exact: HashMap<String, SinkFactory>,
    schemes: Vec<(String, SinkFactory)>,
}

impl SinkRegistry {
    /// Registry without any kinds; every target resolves to a file path
    pub fn empty() -> Self {
        Self {
            exact: HashMap::new(),
            schemes: Vec::new(),
        }
    }

    /// Register an exact target tag, e.g. `stdout`
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str) -> Result<SinkTarget, SinkError> + Send + Sync + 'static,
    {
        self.exact.insert(tag.into(), Arc::new(factory));
        self
    }

    /// Register a scheme prefix, e.g. `file://`
    pub fn register_scheme<F>(&mut self, scheme: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str) -> Result<SinkTarget, SinkError> + Send + Sync + 'static,
    {
        let scheme = scheme.into();
        self.schemes.retain(|(existing, _)| *existing != scheme);
        self.schemes.push((scheme, Arc::new(factory)));
        self.schemes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Make `tag` resolve the way `to` does; `false` when `to` is unknown
    pub fn redirect(&mut self, tag: impl Into<String>, to: &str) -> bool {
        let Some(factory) = self.exact.get(to).cloned() else {
            return false;
        };
        self.exact.insert(tag.into(), factory);
        true
    }

    /// Resolve a handler target to a writer
    pub fn resolve(&self, target: &str) -> Result<SinkTarget, SinkError> {
        let target = target.trim();
        if let Some(factory) = self.exact.get(target) {
            return factory(target);
        }
        for (scheme, factory) in &self.schemes {
            if let Some(rest) = target.strip_prefix(scheme.as_str()) {
                return factory(rest);
            }
        }
        if target.is_empty() || target.contains("://") {
            return Err(SinkError::UnknownKind(target.to_string()));
        }
        open_file(target)
    }

    /// Resolve a target and wrap it for inline or background writing
    ///
    /// With `enqueue`, records go through a `tracing_appender` worker thread;
    /// the returned guard drains it when dropped. The queue is not lossy: a
    /// full queue blocks the emitting thread until the worker catches up.
    pub fn build(&self, target: &str, enqueue: bool) -> Result<BuiltSink, SinkError> {
        let SinkTarget { writer, terminal } = self.resolve(target)?;

        if enqueue {
            let (non_blocking, guard) = NonBlockingBuilder::default()
                .lossy(false)
                .thread_name("logweave-sink")
                .finish(writer);
            Ok(BuiltSink {
                sink: Arc::new(WriterSink::new(target, non_blocking).terminal(terminal)),
                guard: Some(guard),
            })
        } else {
            Ok(BuiltSink {
                sink: Arc::new(WriterSink {
                    label: target.to_string(),
                    writer: Mutex::new(writer),
                    terminal,
                }),
                guard: None,
            })
        }
    }
}

impl Default for SinkRegistry {
    /// `stdout`, `stderr` (also as `ext://sys.stdout` / `ext://sys.stderr`)
    /// and `file://<path>`
    fn default() -> Self {
        let mut registry = Self::empty();
        for tag in ["stdout", "ext://sys.stdout"] {
            registry.register(tag, |_| {
                Ok(SinkTarget {
                    writer: Box::new(io::stdout()),
                    terminal: console::Term::stdout().is_term(),
                })
            });
        }
        for tag in ["stderr", "ext://sys.stderr"] {
            registry.register(tag, |_| {
                Ok(SinkTarget {
                    writer: Box::new(io::stderr()),
                    terminal: console::Term::stderr().is_term(),
                })
            });
        }
        registry.register_scheme("file://", open_file);
        registry
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.exact.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("SinkRegistry")
            .field("tags", &tags)
            .field(
                "schemes",
                &self.schemes.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Open `path` for appending, creating parent directories as needed
fn open_file(path: &str) -> Result<SinkTarget, SinkError> {
    let io_err = |source| SinkError::Io {
        target: path.to_string(),
        source,
    };

    let path_ref = Path::new(path);
    if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path_ref)
        .map_err(io_err)?;

    Ok(SinkTarget::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Severity;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::thread;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_file_target_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.log");
        let registry = SinkRegistry::default();

        let built = registry
            .build(&format!("file://{}", path.display()), false)
            .unwrap();
        built
            .sink
            .write_record(&LogRecord::new(Severity::INFO, "x"), "first line")
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first line\n");
    }

    #[test]
    fn test_plain_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.log");
        let registry = SinkRegistry::default();

        assert!(registry.resolve(path.to_str().unwrap()).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let registry = SinkRegistry::default();
        assert!(matches!(
            registry.resolve("syslog://localhost"),
            Err(SinkError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_custom_kind() {
        let buffer = SharedBuffer::default();
        let mut registry = SinkRegistry::empty();
        let shared = buffer.clone();
        registry.register("memory", move |_| Ok(SinkTarget::new(shared.clone())));

        let built = registry.build("memory", false).unwrap();
        built
            .sink
            .write_record(&LogRecord::new(Severity::INFO, "x"), "hello")
            .unwrap();

        assert_eq!(buffer.contents(), "hello\n");
    }

    #[test]
    fn test_redirected_tag_uses_other_kind() {
        let buffer = SharedBuffer::default();
        let mut registry = SinkRegistry::default();
        let shared = buffer.clone();
        registry.register("memory", move |_| Ok(SinkTarget::new(shared.clone())));

        assert!(registry.redirect("stdout", "memory"));
        assert!(!registry.redirect("stderr", "nowhere"));
        let built = registry.build("stdout", false).unwrap();
        built
            .sink
            .write_record(&LogRecord::new(Severity::INFO, "x"), "not on stdout")
            .unwrap();

        assert_eq!(buffer.contents(), "not on stdout\n");
    }

    #[test]
    fn test_enqueued_sink_flushes_on_guard_drop() {
        let buffer = SharedBuffer::default();
        let mut registry = SinkRegistry::empty();
        let shared = buffer.clone();
        registry.register("memory", move |_| Ok(SinkTarget::new(shared.clone())));

        let built = registry.build("memory", true).unwrap();
        assert!(built.guard.is_some());
        built
            .sink
            .write_record(&LogRecord::new(Severity::INFO, "x"), "queued")
            .unwrap();
        drop(built);

        assert_eq!(buffer.contents(), "queued\n");
    }

    /// Writer that blocks until its gate opens, counting lines
    #[derive(Clone)]
    struct GatedWriter {
        open: Arc<AtomicBool>,
        buffer: SharedBuffer,
    }

    impl Write for GatedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            while !self.open.load(AtomicOrdering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
            self.buffer.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_enqueued_sink_keeps_every_record_when_queue_fills() {
        const RECORDS: usize = 130_000;

        let open = Arc::new(AtomicBool::new(false));
        let buffer = SharedBuffer::default();
        let writer = GatedWriter {
            open: open.clone(),
            buffer: buffer.clone(),
        };
        let mut registry = SinkRegistry::empty();
        registry.register("gated", move |_| Ok(SinkTarget::new(writer.clone())));
        let built = registry.build("gated", true).unwrap();

        let opener = {
            let open = open.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(500));
                open.store(true, AtomicOrdering::Release);
            })
        };

        let record = LogRecord::new(Severity::INFO, "x");
        let failures = (0..RECORDS)
            .filter(|i| built.sink.write_record(&record, &format!("record {i}")).is_err())
            .count();
        opener.join().unwrap();
        drop(built);

        let contents = buffer.contents();
        assert_eq!(failures, 0);
        assert_eq!(contents.lines().count(), RECORDS);
        assert!(contents.lines().all(|line| line.starts_with("record ")));
        assert!(contents.ends_with(&format!("record {}\n", RECORDS - 1)));
    }

    #[test]
    fn test_capture_sink() {
        let sink = CaptureSink::new();
        sink.write_record(&LogRecord::new(Severity::INFO, "m"), "rendered m")
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.messages(), vec!["m".to_string()]);
        assert_eq!(sink.lines(), vec!["rendered m".to_string()]);
        sink.clear();
        assert!(sink.is_empty());
    }
}
