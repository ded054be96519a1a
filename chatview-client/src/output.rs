//! Terminal output coordination
//!
//! The network task and the line editor share one terminal. While the
//! user is composing a line, asynchronously arriving output is queued
//! and only written once composing ends, so it never lands in the middle
//! of the line being edited.

use std::collections::VecDeque;
use std::io::{self, Write};

use parking_lot::Mutex;

/// Line terminator used for all published output
///
/// Raw mode disables output post-processing, so a bare `\n` would not
/// return the cursor to column zero.
const LINE_END: &str = "\r\n";

struct Inner {
    composing: bool,
    queue: VecDeque<String>,
    sink: Box<dyn Write + Send>,
}

impl Inner {
    fn write_line(&mut self, line: &str) {
        let result = self
            .sink
            .write_all(line.as_bytes())
            .and_then(|()| self.sink.write_all(LINE_END.as_bytes()));
        if let Err(e) = result {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }

    fn drain(&mut self) {
        while let Some(line) = self.queue.pop_front() {
            self.write_line(&line);
        }
        if let Err(e) = self.sink.flush() {
            tracing::warn!("Failed to flush terminal: {}", e);
        }
    }
}

/// Serializes terminal writes between the network and editor contexts
///
/// The composing flag, the queue and the sink sit behind a single lock,
/// so a `publish` racing with `end_composing` is either queued and
/// drained, or written after the drain. Arrival order is preserved.
pub struct OutputCoordinator {
    inner: Mutex<Inner>,
}

impl OutputCoordinator {
    /// Create a coordinator writing to `sink`
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                composing: false,
                queue: VecDeque::new(),
                sink: Box::new(sink),
            }),
        }
    }

    /// Create a coordinator writing to stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Start holding published output
    pub fn begin_composing(&self) {
        self.inner.lock().composing = true;
    }

    /// Stop holding output and flush everything queued, oldest first
    pub fn end_composing(&self) {
        let mut inner = self.inner.lock();
        if !inner.composing {
            return;
        }
        inner.composing = false;
        inner.drain();
    }

    /// Whether output is currently being held
    #[cfg(test)]
    pub fn is_composing(&self) -> bool {
        self.inner.lock().composing
    }

    /// Number of lines waiting for composing to end
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Emit a fully rendered line, or queue it while composing
    pub fn publish(&self, line: impl Into<String>) {
        let line = line.into();
        let mut inner = self.inner.lock();
        if inner.composing {
            inner.queue.push_back(line);
        } else {
            inner.write_line(&line);
            if let Err(e) = inner.sink.flush() {
                tracing::warn!("Failed to flush terminal: {}", e);
            }
        }
    }

    /// Write raw bytes (no terminator) while holding the output lock
    ///
    /// Used by the editor to redraw its line without racing a drain.
    pub fn write_raw(&self, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.sink.write_all(bytes)?;
        inner.sink.flush()
    }

    /// Release any held output; called once at shutdown
    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        inner.composing = false;
        inner.drain();
    }
}

impl Drop for OutputCoordinator {
    fn drop(&mut self) {
        self.inner.get_mut().drain();
    }
}
