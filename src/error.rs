//! Error types for the transport, the codec and session setup.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures decoding a record off the wire.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("description is not valid utf-8")]
    Description(#[from] std::str::Utf8Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot create channel {}: {source}", .path.display())]
    ChannelCreationFailed { path: PathBuf, source: io::Error },
    #[error("cannot open channel {}: {source}", .path.display())]
    ChannelOpenFailed { path: PathBuf, source: io::Error },
    #[error("channel peer has gone away")]
    ChannelClosed,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt record: {0}")]
    Codec(#[from] CodecError),
    #[error("cannot start {name} thread: {source}")]
    Spawn { name: &'static str, source: io::Error },
    #[error("cannot install handler for signal {signal}: {source}")]
    Signal { signal: i32, source: io::Error },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
