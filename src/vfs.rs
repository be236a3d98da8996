//! Operation table of a pluggable VFS stack.
//!
//! Each layer implements [`VfsOps`] and forwards to the layer below it.
//! [`PosixVfs`] is the bottom of the stack and talks to the OS directly.
//! [`RDirect`] sits above another layer, forces `O_DIRECT` on open and
//! turns every read into an aligned direct read.

use crate::error::Error;
use crate::options::Options;
use crate::policy::OpenPolicy;
use crate::reader::ReadContext;
use crate::request::PreadRequest;
use crate::state::State;

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

use tracing::debug;

/// File operations a VFS layer provides.
pub trait VfsOps: Send + Sync {
    /// Open `path` with raw `open(2)` flags and creation mode.
    fn openat(&self, path: &Path, flags: i32, mode: u32) -> io::Result<File>;

    /// Read into `buf` at `offset`.
    fn pread(&self, file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Submit a read and return a request for its result.
    ///
    /// The default runs [`pread`](VfsOps::pread) synchronously and defers
    /// only the completion notification.
    fn pread_send(&self, file: &File, buf: &mut [u8], offset: u64) -> PreadRequest {
        PreadRequest::submit(|| self.pread(file, buf, offset).map_err(Error::Read))
    }

    /// Receive the result of a request once its completion was delivered.
    fn pread_recv(&self, req: &mut PreadRequest) -> io::Result<usize> {
        req.try_receive().map_err(io::Error::from)
    }
}

/// Bottom layer: plain system calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixVfs;

impl VfsOps for PosixVfs {
    fn openat(&self, path: &Path, flags: i32, mode: u32) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => options.write(true),
            libc::O_RDWR => options.read(true).write(true),
            _ => options.read(true),
        };
        if flags & libc::O_CREAT != 0 {
            options.create(true).mode(mode);
        }
        options.custom_flags(flags & !(libc::O_ACCMODE | libc::O_CREAT));
        options.open(path)
    }

    fn pread(&self, file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(file, buf, offset)
    }
}

/// Direct-read module layered over `N`.
#[derive(Debug, Clone)]
pub struct RDirect<N = PosixVfs> {
    next: N,
    options: Options,
    policy: OpenPolicy,
}

impl RDirect<PosixVfs> {
    /// Module over the plain system-call layer.
    pub fn new(options: Options) -> crate::Result<Self> {
        Self::with_next(PosixVfs, options)
    }
}

impl<N: VfsOps> RDirect<N> {
    /// Module over an arbitrary next layer.
    pub fn with_next(next: N, options: Options) -> crate::Result<Self> {
        Ok(Self {
            next,
            options: options.checked()?,
            policy: OpenPolicy::new(),
        })
    }

    /// Replace the open policy.
    pub fn with_policy(mut self, policy: OpenPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Read with full details about the aligned transfer.
    pub fn read(&self, file: &File, buf: &mut [u8], offset: u64) -> crate::Result<State> {
        ReadContext::new(file, &self.options).read_at(buf, offset, |file, buf, offset| {
            self.next.pread(file, buf, offset)
        })
    }
}

impl<N: VfsOps> VfsOps for RDirect<N> {
    fn openat(&self, path: &Path, flags: i32, mode: u32) -> io::Result<File> {
        let new_flags = self.policy.apply(flags, mode);
        debug!(
            path = %path.display(),
            flags = format_args!("{:#x}", flags),
            mode = format_args!("{:#o}", mode),
            direct = new_flags != flags,
            "openat"
        );
        self.next.openat(path, new_flags, mode)
    }

    fn pread(&self, file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let state = self.read(file, buf, offset)?;
        Ok(state.bytes_read)
    }

    fn pread_send(&self, file: &File, buf: &mut [u8], offset: u64) -> PreadRequest {
        PreadRequest::submit(|| self.read(file, buf, offset).map(|state| state.bytes_read))
    }
}
