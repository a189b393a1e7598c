use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::{Error, Result};

/// Writable stream that receives trace lines and unhandled console output.
///
/// Clones share the same underlying writer. The default sink discards
/// everything written to it.
#[derive(Clone)]
pub struct DebugSink {
    writer: Rc<RefCell<Box<dyn Write>>>,
}

impl DebugSink {
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            writer: Rc::new(RefCell::new(Box::new(writer))),
        }
    }

    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// Writes one line. Write failures are ignored: a broken debug stream
    /// must never fail a page load.
    pub fn write_line(&self, line: &str) {
        let mut writer = self.writer.borrow_mut();
        let _ = writeln!(writer, "{line}");
        let _ = writer.flush();
    }
}

impl Default for DebugSink {
    fn default() -> Self {
        Self::discard()
    }
}

impl fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DebugSink")
    }
}

/// In-memory writer whose contents stay readable after being handed to a
/// [`DebugSink`].
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: false,
        }
    }
}

/// Trace handle shared by a window and its script context.
#[derive(Debug, Clone)]
pub(crate) struct Tracer {
    state: Rc<RefCell<TraceState>>,
    sink: DebugSink,
}

impl Tracer {
    pub(crate) fn new(sink: DebugSink) -> Self {
        Self {
            state: Rc::new(RefCell::new(TraceState::default())),
            sink,
        }
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    pub(crate) fn set_to_stderr(&self, enabled: bool) {
        self.state.borrow_mut().to_stderr = enabled;
    }

    pub(crate) fn set_log_limit(&self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::InvalidConfig(
                "trace log limit requires at least 1 entry".into(),
            ));
        }
        let mut state = self.state.borrow_mut();
        state.log_limit = max_entries;
        while state.logs.len() > state.log_limit {
            state.logs.pop_front();
        }
        Ok(())
    }

    pub(crate) fn take_logs(&self) -> Vec<String> {
        self.state.borrow_mut().logs.drain(..).collect()
    }

    pub(crate) fn line(&self, line: String) {
        let mut state = self.state.borrow_mut();
        if !state.enabled {
            return;
        }
        if state.to_stderr {
            eprintln!("{line}");
        }
        self.sink.write_line(&line);
        if state.logs.len() >= state.log_limit {
            state.logs.pop_front();
        }
        state.logs.push_back(line);
    }
}
