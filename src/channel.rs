//! Named FIFO transport carrying fixed-size order records in one direction.

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::codec::{self, RECORD_SIZE};
use crate::error::{PipelineError, Result};
use crate::types::OrderRecord;

const FIFO_MODE: libc::mode_t = 0o666;

/// Create a FIFO at `path`; fails if anything already exists there.
pub fn create(path: &Path) -> Result<()> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        PipelineError::ChannelCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(ErrorKind::InvalidInput, "path contains NUL"),
        }
    })?;
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), FIFO_MODE) };
    if rc != 0 {
        return Err(PipelineError::ChannelCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Remove the endpoint at `path`. Returns false if it was already absent.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn open_failed(path: &Path, source: io::Error) -> PipelineError {
    PipelineError::ChannelOpenFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Read end of a channel.
pub struct ChannelReader {
    file: File,
}

impl ChannelReader {
    /// Blocks until a writer opens the other end.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|err| open_failed(path, err))?;
        Ok(Self { file })
    }

    /// Open without waiting for a writer. Until one connects a read would
    /// report end-of-stream, so only read once the peer is known to be attached.
    pub fn open_before_writer(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|err| open_failed(path, err))?;
        set_blocking(&file).map_err(|err| open_failed(path, err))?;
        Ok(Self { file })
    }

    /// Block for one whole record; `None` once the writer closed with nothing pending.
    pub fn read_record(&mut self) -> Result<Option<OrderRecord>> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("peer closed after {filled} of {RECORD_SIZE} bytes"),
                    )
                    .into());
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(Some(codec::decode(&buf)?))
    }

    /// Wait up to `timeout` for data or a hangup; false on timeout or signal.
    pub fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        poll_fd(self.file.as_raw_fd(), libc::POLLIN, timeout)
    }
}

/// Write end of a channel.
pub struct ChannelWriter {
    file: File,
}

impl ChannelWriter {
    /// Blocks until a reader opens the other end.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|err| open_failed(path, err))?;
        Ok(Self { file })
    }

    /// Like [`ChannelWriter::open`], but retries every `retry` until a reader
    /// appears, giving up with `ChannelOpenFailed` once `abandon()` is true.
    pub fn open_when_reader_ready(
        path: &Path,
        retry: Duration,
        abandon: impl Fn() -> bool,
    ) -> Result<Self> {
        loop {
            match OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)
            {
                Ok(file) => {
                    set_blocking(&file).map_err(|err| open_failed(path, err))?;
                    return Ok(Self { file });
                }
                // ENXIO: no reader has the FIFO open yet.
                Err(err) if err.raw_os_error() == Some(libc::ENXIO) => {
                    if abandon() {
                        return Err(open_failed(
                            path,
                            io::Error::new(ErrorKind::NotConnected, "reader never connected"),
                        ));
                    }
                    thread::sleep(retry);
                }
                Err(err) => return Err(open_failed(path, err)),
            }
        }
    }

    /// Send one record as a single write; `ChannelClosed` if the reader is gone.
    pub fn write_record(&mut self, record: &OrderRecord) -> Result<()> {
        let buf = codec::encode(record);
        match self.file.write_all(&buf) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::BrokenPipe => Err(PipelineError::ChannelClosed),
            Err(err) => Err(err.into()),
        }
    }
}

fn set_blocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Poll a single descriptor. Hangup and error conditions count as ready so the
/// caller's next read observes them.
pub(crate) fn poll_fd(fd: libc::c_int, events: libc::c_short, timeout: Duration) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let res = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if res < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err.into());
    }
    Ok(res > 0 && pfd.revents != 0)
}
