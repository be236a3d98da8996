//! Error types for direct reads.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors produced by the direct read path.
#[derive(Error, Debug)]
pub enum Error {
    /// The destination holds less than one block (after any reserved terminator).
    #[error("buffer of {len} bytes is smaller than one {block_size}-byte block")]
    InsufficientBuffer { len: usize, block_size: usize },

    /// The descriptor could not be mapped back to a filesystem path.
    #[error("failed to resolve descriptor {fd} to a path: {source}")]
    ResolveFailed {
        fd: i32,
        #[source]
        source: io::Error,
    },

    /// The file could not be (re)opened for direct I/O.
    #[error("failed to reopen {} for direct I/O: {}", .path.display(), .source)]
    ReopenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The underlying read call failed.
    #[error("direct read failed: {0}")]
    Read(#[source] io::Error),

    /// The completion of a request has not been delivered yet.
    #[error("request has not completed")]
    NotReady,

    /// The result of a request was already taken.
    #[error("request result was already received")]
    AlreadyReceived,

    /// Block size is zero or not a power of two.
    #[error("invalid block size {0}: must be a non-zero power of two")]
    InvalidBlockSize(usize),

    /// A module with the same name is already registered.
    #[error("module already registered: {0}")]
    AlreadyRegistered(String),
}

impl Error {
    /// OS-style error code for this error.
    pub fn raw_os_error(&self) -> i32 {
        match self {
            Error::InsufficientBuffer { .. } | Error::InvalidBlockSize(_) => libc::EINVAL,
            Error::ResolveFailed { source, .. } => source.raw_os_error().unwrap_or(libc::EBADF),
            Error::ReopenFailed { source, .. } | Error::Read(source) => {
                source.raw_os_error().unwrap_or(libc::EIO)
            }
            Error::NotReady => libc::EAGAIN,
            Error::AlreadyReceived => libc::EINVAL,
            Error::AlreadyRegistered(_) => libc::EEXIST,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            // Keep the OS error as-is so callers see the original errno.
            Error::Read(source) => source,
            other => {
                debug!(error = %other, "direct read error crossing operation table");
                io::Error::from_raw_os_error(other.raw_os_error())
            }
        }
    }
}

/// Result type for direct read operations.
pub type Result<T> = std::result::Result<T, Error>;
