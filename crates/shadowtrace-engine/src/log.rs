//! Structured JSONL run-log: one object per line (timestamp/level/event
//! plus a free-form details bag), deliberately hand-rolled rather than
//! built on `tracing`/`log`. The engine must not re-enter the guest's own
//! libc while guest code is being instrumented, and a global logging
//! facade risks exactly that if the guest's own symbols get hooked into
//! it.

use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub ts: u64,
    pub level: LogLevel,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
}

/// Writes one JSON object per line to a file, fd, or in-memory buffer.
pub struct Logger {
    writer: Box<dyn Write + Send>,
}

impl Logger {
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Logger { writer }
    }

    pub fn to_file(path: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Logger { writer: Box::new(std::io::BufWriter::new(file)) })
    }

    /// An in-memory sink for tests, returning a handle that stays
    /// readable after the `Logger` itself is dropped.
    pub fn to_buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedBuffer(Arc::clone(&buf));
        (Logger { writer: Box::new(sink) }, buf)
    }

    /// Emit one log line at `ts` (caller-supplied, since this crate must
    /// not call a clock itself to stay reproducible in tests).
    pub fn log(&mut self, ts: u64, level: LogLevel, event: &str, fields: Option<serde_json::Value>) -> std::io::Result<()> {
        let line = LogLine { ts, level, event: event.to_string(), fields };
        let json = serde_json::to_string(&line).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{json}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
