//! Operator line input with a wait that can be cut short by the shutdown flag.

use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::os::unix::io::{AsFd, AsRawFd, RawFd};
use std::time::Duration;

use crate::channel::poll_fd;
use crate::error::Result;
use crate::state::ShutdownFlag;

/// One step of operator input.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// A line with its terminator stripped.
    Text(String),
    EndOfInput,
    /// Shutdown was requested while waiting.
    Interrupted,
}

pub struct LinePrompt<R> {
    reader: BufReader<R>,
    /// Descriptor polled before blocking; `None` reads straight away.
    watch_fd: Option<RawFd>,
    poll_interval: Duration,
}

impl LinePrompt<File> {
    /// Reads a private duplicate of stdin so no std-side buffer hides input from `poll`.
    pub fn stdin(poll_interval: Duration) -> Result<Self> {
        let file = File::from(io::stdin().as_fd().try_clone_to_owned()?);
        let fd = file.as_raw_fd();
        Ok(Self {
            reader: BufReader::new(file),
            watch_fd: Some(fd),
            poll_interval,
        })
    }
}

impl<R: Read> LinePrompt<R> {
    /// Reader that is always ready (files, byte slices).
    #[cfg(test)]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            watch_fd: None,
            poll_interval: Duration::ZERO,
        }
    }

    pub fn next_line(&mut self, shutdown: &ShutdownFlag) -> Result<Line> {
        if let Some(fd) = self.watch_fd {
            // Buffered bytes are already readable; only poll an empty buffer.
            while self.reader.buffer().is_empty() {
                if shutdown.is_raised() {
                    return Ok(Line::Interrupted);
                }
                if poll_fd(fd, libc::POLLIN, self.poll_interval)? {
                    break;
                }
            }
        }
        if shutdown.is_raised() {
            return Ok(Line::Interrupted);
        }

        let mut line = String::new();
        let read = loop {
            match self.reader.read_line(&mut line) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted && shutdown.is_raised() => {
                    return Ok(Line::Interrupted);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };
        if read == 0 {
            return Ok(Line::EndOfInput);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Line::Text(line))
    }
}
