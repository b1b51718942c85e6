//! Trace sinks for human-readable lines emitted while a permutation runs.

use parking_lot::Mutex;

/// Destination for trace lines. Format and storage are up to the sink.
pub trait TraceSink: Send + Sync {
    fn trace(&self, file: &str, line: u32, message: &str);
}

/// Forwards trace lines to `tracing` at TRACE level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn trace(&self, file: &str, line: u32, message: &str) {
        tracing::trace!(target: "lfsperm::trace", file, line, "{message}");
    }
}

/// Collects lines as `"{file}:{line}:trace: {message}"`.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl TraceSink for BufferSink {
    fn trace(&self, file: &str, line: u32, message: &str) {
        self.lines.lock().push(format!("{file}:{line}:trace: {message}"));
    }
}

/// Emit a formatted trace line through a sink, tagged with the call site.
///
/// ```
/// use lfsperm_harness::{BufferSink, lfs_trace};
///
/// let sink = BufferSink::new();
/// lfs_trace!(sink, "mounted {} blocks", 256);
/// assert!(sink.lines()[0].ends_with(":trace: mounted 256 blocks"));
/// ```
#[macro_export]
macro_rules! lfs_trace {
    ($sink:expr, $($arg:tt)+) => {
        $crate::TraceSink::trace(&$sink, file!(), line!(), &format!($($arg)+))
    };
}
