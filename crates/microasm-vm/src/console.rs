//! Program input and output for the I/O opcodes

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

/// Output port selected by the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Port 1
    Stdout,
    /// Port 2
    Stderr,
}

impl Port {
    /// Map a port number, `None` for anything but 1 and 2
    pub fn from_number(port: i32) -> Option<Self> {
        match port {
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// Receives program output and supplies `IN` lines
pub trait Console {
    /// Write raw bytes to a port
    fn write(&mut self, port: Port, bytes: &[u8]) -> io::Result<()>;

    /// Next input line without its terminator, `None` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(None)
    }

    /// Flush buffered output; called when execution stops
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes to the process's stdout and stderr
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&mut self, port: Port, bytes: &[u8]) -> io::Result<()> {
        match port {
            Port::Stdout => io::stdout().lock().write_all(bytes),
            Port::Stderr => io::stderr().lock().write_all(bytes),
        }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        // Prompts written without a newline must be visible before blocking
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_terminator(line)))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()
    }
}

fn strip_terminator(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

/// Captures output in shared buffers, one per port, and replays queued input
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    stdout: Rc<RefCell<Vec<u8>>>,
    stderr: Rc<RefCell<Vec<u8>>>,
    input: Rc<RefCell<VecDeque<String>>>,
}

impl BufferConsole {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line for `IN`
    pub fn push_input(&self, line: impl Into<String>) {
        self.input.borrow_mut().push_back(line.into());
    }

    /// Everything written to port 1, lossily decoded
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout.borrow()).into_owned()
    }

    /// Everything written to port 2, lossily decoded
    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr.borrow()).into_owned()
    }
}

impl Console for BufferConsole {
    fn write(&mut self, port: Port, bytes: &[u8]) -> io::Result<()> {
        let buf = match port {
            Port::Stdout => &self.stdout,
            Port::Stderr => &self.stderr,
        };
        buf.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.borrow_mut().pop_front())
    }
}
