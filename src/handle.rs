//! Direct-I/O handles.
//!
//! A read is always issued on a [`DirectHandle`]. In passthrough mode it
//! borrows the handle the caller opened; in standalone mode the caller's
//! descriptor is resolved to a path through `/proc/self/fd` and opened
//! again with `O_DIRECT`. The reopened handle lives for one read only and is
//! closed when the [`DirectHandle`] is dropped, on every exit path.

use crate::error::{Error, Result};
use crate::options::{Mode, Options};

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Handle the direct read is issued on.
#[derive(Debug)]
pub enum DirectHandle<'a> {
    /// Handle owned by the caller.
    Borrowed(&'a File),
    /// Handle opened for this read, together with the path it was opened from.
    Owned { path: PathBuf, file: File },
}

impl DirectHandle<'_> {
    /// The file to read from.
    pub fn file(&self) -> &File {
        match self {
            DirectHandle::Borrowed(file) => file,
            DirectHandle::Owned { file, .. } => file,
        }
    }

    /// The resolved path, for handles opened by the reader.
    pub fn path(&self) -> Option<&Path> {
        match self {
            DirectHandle::Borrowed(_) => None,
            DirectHandle::Owned { path, .. } => Some(path),
        }
    }
}

/// Source of direct-I/O handles for a caller's file.
pub trait HandleSource: Sync {
    /// Produce the handle a read on `file` should be issued on.
    fn acquire<'a>(&self, file: &'a File, options: &Options) -> Result<DirectHandle<'a>>;
}

/// Uses the caller's handle unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl HandleSource for Passthrough {
    fn acquire<'a>(&self, file: &'a File, _options: &Options) -> Result<DirectHandle<'a>> {
        Ok(DirectHandle::Borrowed(file))
    }
}

/// Resolves the caller's descriptor to a path and reopens it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Standalone;

impl HandleSource for Standalone {
    fn acquire<'a>(&self, file: &'a File, options: &Options) -> Result<DirectHandle<'a>> {
        let path = resolve_path(file)?;
        let file = open_direct(&path, options.direct_io).map_err(|source| Error::ReopenFailed {
            path: path.clone(),
            source,
        })?;
        Ok(DirectHandle::Owned { path, file })
    }
}

impl Mode {
    /// Handle source implementing this mode.
    pub fn handle_source(self) -> &'static dyn HandleSource {
        match self {
            Mode::Passthrough => &Passthrough,
            Mode::Standalone => &Standalone,
        }
    }
}

/// Map an open descriptor to the path it was opened from.
///
/// The path is only meaningful while the descriptor stays open.
pub fn resolve_path(file: &impl AsRawFd) -> Result<PathBuf> {
    let fd = file.as_raw_fd();
    let path = std::fs::read_link(fd_link(fd)).map_err(|source| Error::ResolveFailed { fd, source })?;

    if path.as_os_str().is_empty() {
        return Err(Error::ResolveFailed {
            fd,
            source: io::Error::new(io::ErrorKind::NotFound, "descriptor link is empty"),
        });
    }
    Ok(path)
}

fn fd_link(fd: RawFd) -> PathBuf {
    PathBuf::from(format!("/proc/self/fd/{}", fd))
}

/// Open `path` read-only, with `O_DIRECT` when `direct` is set.
pub fn open_direct(path: &Path, direct: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);
    if direct {
        options.custom_flags(libc::O_DIRECT);
    }
    options.open(path)
}
