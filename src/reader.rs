//! Core reader trait and implementations.
//!
//! This module provides the [`DirectRead`] trait which reads file data into
//! an arbitrary caller buffer while the underlying read is issued into the
//! block-aligned window of that buffer, as direct I/O requires.

use crate::align::{align_slice, AlignedView};
use crate::error::{Error, Result};
use crate::handle::open_direct;
use crate::options::{Mode, Options};
use crate::state::State;

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

/// Trait for reading file data with direct I/O into unaligned buffers.
///
/// # Example
///
/// ```no_run
/// use rdirect::{DirectRead, Mode, Options};
/// use std::path::Path;
///
/// let path = Path::new("/path/to/file");
/// let mut buf = vec![0u8; 4096];
///
/// // Simple read
/// let bytes = path.direct_read_at(&mut buf, 0).unwrap();
///
/// // Read with options
/// let opts = Options::new().with_mode(Mode::Standalone);
/// let state = path.direct_read_at_opt(&mut buf, 0, &opts).unwrap();
/// ```
pub trait DirectRead {
    /// Read data at `offset` with default options.
    ///
    /// Returns the number of bytes placed at the start of `buf`.
    fn direct_read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let state = self.direct_read_at_opt(buf, offset, &Options::default())?;
        Ok(state.bytes_read)
    }

    /// Read data at `offset` with options.
    ///
    /// # Returns
    ///
    /// A [`State`] with the number of bytes read and the aligned window the
    /// read was issued into, or an error.
    fn direct_read_at_opt(&self, buf: &mut [u8], offset: u64, options: &Options) -> Result<State>;
}

/// Internal helper to perform one read.
pub(crate) struct ReadContext<'a> {
    file: &'a File,
    options: &'a Options,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(file: &'a File, options: &'a Options) -> Self {
        Self { file, options }
    }

    /// Read into `buf` at `offset`, issuing the underlying read through `read`.
    pub(crate) fn read_at<F>(&self, buf: &mut [u8], offset: u64, read: F) -> Result<State>
    where
        F: FnOnce(&File, &mut [u8], u64) -> io::Result<usize>,
    {
        self.options.validate()?;
        let block_size = self.options.block_size;
        let mode = self.options.mode;

        debug!(
            fd = self.file.as_raw_fd(),
            data = ?buf.as_ptr(),
            n = buf.len(),
            offset,
            %mode,
            "direct pread"
        );

        let usable = buf.len().saturating_sub(usize::from(self.terminates()));
        if usable < block_size {
            return Err(Error::InsufficientBuffer {
                len: buf.len(),
                block_size,
            });
        }

        if mode == Mode::Standalone && offset > 0 {
            return Ok(State::end_of_file());
        }

        let view = align_slice(&buf[..usable], block_size, mode.length_policy());
        trace!(
            address = view.address,
            length = view.length,
            rounding = view.rounding,
            "aligned view"
        );
        self.check_truncation(buf.len(), &view)?;

        // Dropping the handle closes a standalone reopen on every path below.
        let handle = mode.handle_source().acquire(self.file, self.options)?;

        let start = view.rounding;
        let count = read(handle.file(), &mut buf[start..start + view.length], offset)
            .map_err(Error::Read)?;

        if count > 0 && view.rounding != 0 {
            buf.copy_within(start..start + count, 0);
        }
        if self.terminates() {
            buf[count] = 0;
        }

        Ok(State::new(count, view, handle.path().map(Path::to_path_buf)))
    }

    fn terminates(&self) -> bool {
        self.options.nul_terminate && self.options.mode == Mode::Standalone
    }

    fn check_truncation(&self, requested: usize, view: &AlignedView) -> Result<()> {
        let block_size = self.options.block_size;
        if !view.is_truncated(block_size) {
            return Ok(());
        }
        if self.options.strict_alignment {
            return Err(Error::InsufficientBuffer {
                len: view.length,
                block_size,
            });
        }
        warn!(
            requested,
            usable = view.length,
            rounding = view.rounding,
            "rounding left less than one block, reading reduced length"
        );
        Ok(())
    }
}

// Implementation for Path
impl DirectRead for Path {
    fn direct_read_at_opt(&self, buf: &mut [u8], offset: u64, options: &Options) -> Result<State> {
        // Standalone reopens on its own, so the first open stays buffered.
        let direct = options.direct_io && options.mode == Mode::Passthrough;
        let file = open_direct(self, direct).map_err(|source| Error::ReopenFailed {
            path: self.to_path_buf(),
            source,
        })?;
        file.direct_read_at_opt(buf, offset, options)
    }
}

// Implementation for PathBuf
impl DirectRead for PathBuf {
    fn direct_read_at_opt(&self, buf: &mut [u8], offset: u64, options: &Options) -> Result<State> {
        self.as_path().direct_read_at_opt(buf, offset, options)
    }
}

// Implementation for File
impl DirectRead for File {
    fn direct_read_at_opt(&self, buf: &mut [u8], offset: u64, options: &Options) -> Result<State> {
        let ctx = ReadContext::new(self, options);
        ctx.read_at(buf, offset, |file, buf, offset| FileExt::read_at(file, buf, offset))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    const BLOCK: usize = 512;

    /// Carve a `len`-byte slice out of `storage` whose address is `past`
    /// bytes beyond a `block` boundary.
    pub(crate) fn slice_at(storage: &mut [u8], block: usize, past: usize, len: usize) -> &mut [u8] {
        let base = storage.as_ptr() as usize;
        let start = (block + past - base % block) % block;
        &mut storage[start..start + len]
    }

    pub(crate) fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    pub(crate) fn fixture(data: &[u8]) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(data).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    fn buffered() -> Options {
        Options::new().with_direct_io(false)
    }

    #[test]
    fn test_content_preserved_for_any_misalignment() {
        let data = pattern(4096);
        let tmp = fixture(&data);
        let options = buffered();

        for past in [0, 1, 3, 100, 256, 509, 511] {
            let mut storage = vec![0u8; 2048 + BLOCK];
            let buf = slice_at(&mut storage, BLOCK, past, 2048);
            let state = tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap();

            let view = state.view.unwrap();
            assert_eq!(view.rounding, (BLOCK - past) % BLOCK);
            assert_eq!(state.bytes_read, 2048 - view.rounding);

            let mut aligned_storage = vec![0u8; 2048 + BLOCK];
            let aligned = slice_at(&mut aligned_storage, BLOCK, 0, state.bytes_read);
            let expected = tmp.as_file().direct_read_at_opt(aligned, 0, &options).unwrap();
            assert_eq!(expected.bytes_read, state.bytes_read);

            assert_eq!(&buf[..state.bytes_read], &aligned[..expected.bytes_read]);
            assert_eq!(&buf[..state.bytes_read], &data[..state.bytes_read]);
        }
    }

    #[test]
    fn test_content_preserved_at_offset() {
        let data = pattern(8192);
        let tmp = fixture(&data);

        let mut storage = vec![0u8; 4096 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 7, 4096);
        let n = tmp.as_file().direct_read_at_opt(buf, 1024, &buffered()).unwrap().bytes_read;

        assert_eq!(n, 4096 - 505);
        assert_eq!(&buf[..n], &data[1024..1024 + n]);
    }

    #[test]
    fn test_minimum_length_rejected_without_io() {
        let tmp = fixture(&pattern(1024));
        let options = buffered();
        let calls = Cell::new(0);

        for len in [0, 1, 100, BLOCK - 1] {
            let mut storage = vec![0u8; len + BLOCK];
            let buf = slice_at(&mut storage, BLOCK, 0, len);
            let ctx = ReadContext::new(tmp.as_file(), &options);
            let err = ctx
                .read_at(buf, 0, |_, _, _| {
                    calls.set(calls.get() + 1);
                    Ok(0)
                })
                .unwrap_err();
            assert!(matches!(err, Error::InsufficientBuffer { len: l, block_size: BLOCK } if l == len));
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_minimum_length_rejected_in_standalone() {
        let tmp = fixture(&pattern(1024));
        let options = buffered().with_mode(Mode::Standalone);
        let mut buf = vec![0u8; 511];
        let err = tmp.as_file().direct_read_at_opt(&mut buf, 0, &options).unwrap_err();
        assert!(matches!(err, Error::InsufficientBuffer { .. }));
    }

    #[test]
    fn test_truncation_quirk_passthrough() {
        let data = pattern(600);
        let tmp = fixture(&data);
        let options = buffered();
        let requested = Cell::new(None);

        let mut storage = vec![0u8; 1024 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 3, 600);
        let ctx = ReadContext::new(tmp.as_file(), &options);
        let state = ctx
            .read_at(buf, 0, |file, dst, offset| {
                requested.set(Some(dst.len()));
                FileExt::read_at(file, dst, offset)
            })
            .unwrap();

        assert_eq!(requested.get(), Some(91));
        let view = state.view.unwrap();
        assert_eq!(view.rounding, 509);
        assert_eq!(view.length, 91);
        assert!(state.truncated(BLOCK));
        assert_eq!(state.bytes_read, 91);
        assert_eq!(&buf[..91], &data[..91]);
    }

    #[test]
    fn test_truncation_quirk_diverges_between_modes() {
        let data = pattern(600);
        let tmp = fixture(&data);

        let mut storage = vec![0u8; 1024 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 3, 600);
        let passthrough = tmp.as_file().direct_read_at_opt(buf, 0, &buffered()).unwrap();
        assert_eq!(passthrough.view.unwrap().length, 91);
        assert_eq!(passthrough.bytes_read, 91);

        let standalone_opts = buffered().with_mode(Mode::Standalone);
        let buf = slice_at(&mut storage, BLOCK, 3, 600);
        let standalone = tmp.as_file().direct_read_at_opt(buf, 0, &standalone_opts).unwrap();
        assert_eq!(standalone.view.unwrap().length, 0);
        assert_eq!(standalone.bytes_read, 0);
        assert!(!standalone.end_of_file_by_policy);
    }

    #[test]
    fn test_strict_alignment_rejects_truncation() {
        let tmp = fixture(&pattern(600));
        let options = buffered().with_strict_alignment(true);

        let mut storage = vec![0u8; 1024 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 3, 600);
        let err = tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap_err();
        assert!(matches!(err, Error::InsufficientBuffer { len: 91, block_size: BLOCK }));

        let buf = slice_at(&mut storage, BLOCK, 0, 600);
        assert_eq!(tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap().bytes_read, 600);
    }

    #[test]
    fn test_standalone_single_shot() {
        let data = pattern(3000);
        let tmp = fixture(&data);
        let options = buffered().with_mode(Mode::Standalone);

        let mut storage = vec![0u8; 1024 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 0, 1024);
        let first = tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap();
        assert_eq!(first.bytes_read, 1024);
        assert_eq!(&buf[..1024], &data[..1024]);
        assert!(first.path.is_some());

        let second = tmp.as_file().direct_read_at_opt(buf, 1024, &options).unwrap();
        assert_eq!(second.bytes_read, 0);
        assert!(second.end_of_file_by_policy);
    }

    #[test]
    fn test_standalone_short_file() {
        let data = pattern(600);
        let tmp = fixture(&data);
        let options = buffered().with_mode(Mode::Standalone);

        let mut storage = vec![0u8; 1024 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 5, 1024);
        let state = tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap();

        // 1024 - 507 rounds down to a single block.
        assert_eq!(state.view.unwrap().length, 512);
        assert_eq!(state.bytes_read, 512);
        assert_eq!(&buf[..512], &data[..512]);
    }

    /// Number of descriptors of this process open on `path`.
    fn open_descriptors(path: &Path) -> usize {
        let target = path.canonicalize().unwrap();
        std::fs::read_dir("/proc/self/fd")
            .unwrap()
            .filter_map(|entry| std::fs::read_link(entry.ok()?.path()).ok())
            .filter(|link| *link == target)
            .count()
    }

    #[test]
    fn test_standalone_reopen_closed_on_every_path() {
        let tmp = fixture(&pattern(2048));
        let options = buffered().with_mode(Mode::Standalone);
        assert_eq!(open_descriptors(tmp.path()), 1);

        let mut buf = vec![0u8; 2048];
        for _ in 0..20 {
            let ctx = ReadContext::new(tmp.as_file(), &options);
            let state = ctx
                .read_at(&mut buf, 0, |file, dst, offset| {
                    // The caller's handle plus the reopened one.
                    assert_eq!(open_descriptors(tmp.path()), 2);
                    FileExt::read_at(file, dst, offset)
                })
                .unwrap();
            assert!(state.bytes_read > 0);
        }
        assert_eq!(open_descriptors(tmp.path()), 1);

        for _ in 0..20 {
            let ctx = ReadContext::new(tmp.as_file(), &options);
            let err = ctx
                .read_at(&mut buf, 0, |_, _, _| Err(io::Error::from_raw_os_error(libc::EIO)))
                .unwrap_err();
            assert_eq!(err.raw_os_error(), libc::EIO);
        }
        assert_eq!(open_descriptors(tmp.path()), 1);
    }

    #[test]
    fn test_nul_terminator_stays_in_bounds() {
        let data = pattern(2048);
        let tmp = fixture(&data);
        let options = buffered().with_mode(Mode::Standalone).with_nul_terminate(true);

        let mut storage = vec![0xffu8; 1025 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 0, 1025);
        let state = tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap();
        assert_eq!(state.bytes_read, 1024);
        assert_eq!(buf[1024], 0);

        let short = fixture(&data[..600]);
        let mut storage = vec![0xffu8; 1025 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 0, 1025);
        let state = short.as_file().direct_read_at_opt(buf, 0, &options).unwrap();
        assert_eq!(state.bytes_read, 600);
        assert_eq!(buf[600], 0);
        assert_eq!(buf[601], 0xff);
    }

    #[test]
    fn test_nul_terminator_reserves_a_byte() {
        let tmp = fixture(&pattern(1024));
        let options = buffered().with_mode(Mode::Standalone).with_nul_terminate(true);

        let mut buf = vec![0u8; BLOCK];
        let err = tmp.as_file().direct_read_at_opt(&mut buf, 0, &options).unwrap_err();
        assert!(matches!(err, Error::InsufficientBuffer { len: BLOCK, .. }));
    }

    #[test]
    fn test_nul_terminator_ignored_in_passthrough() {
        let data = pattern(600);
        let tmp = fixture(&data);
        let options = buffered().with_nul_terminate(true);

        let mut storage = vec![0xffu8; 1024 + BLOCK];
        let buf = slice_at(&mut storage, BLOCK, 0, 1024);
        let state = tmp.as_file().direct_read_at_opt(buf, 0, &options).unwrap();
        assert_eq!(state.bytes_read, 600);
        assert_eq!(buf[600], 0xff);
    }

    #[test]
    fn test_underlying_error_propagated() {
        let tmp = fixture(&pattern(1024));
        let options = buffered();
        let mut buf = vec![0u8; 1024];

        let ctx = ReadContext::new(tmp.as_file(), &options);
        let err = ctx
            .read_at(&mut buf, 0, |_, _, _| Err(io::Error::from_raw_os_error(libc::EIO)))
            .unwrap_err();
        assert!(matches!(err, Error::Read(_)));
        assert_eq!(err.raw_os_error(), libc::EIO);

        // A failed read does not affect the next one.
        let state = tmp.as_file().direct_read_at_opt(&mut buf, 0, &options).unwrap();
        assert!(state.bytes_read > 0);
    }

    #[test]
    fn test_invalid_block_size() {
        let tmp = fixture(&pattern(1024));
        let mut buf = vec![0u8; 1024];
        let options = buffered().with_block_size(1000);
        let err = tmp.as_file().direct_read_at_opt(&mut buf, 0, &options).unwrap_err();
        assert!(matches!(err, Error::InvalidBlockSize(1000)));
    }

    #[test]
    fn test_path_read() {
        let data = pattern(1500);
        let tmp = fixture(&data);

        let mut buf = vec![0u8; 2048];
        let options = buffered();
        let n = tmp.path().direct_read_at_opt(&mut buf, 0, &options).unwrap().bytes_read;
        assert!(n > 0);
        assert_eq!(&buf[..n], &data[..n]);

        let missing = tmp.path().with_extension("missing");
        let err = missing.direct_read_at_opt(&mut buf, 0, &options).unwrap_err();
        assert!(matches!(err, Error::ReopenFailed { .. }));
    }

    #[test]
    fn test_real_direct_io_standalone() {
        let data = pattern(600);
        let tmp = fixture(&data);

        // Skip on filesystems without O_DIRECT support.
        if open_direct(tmp.path(), true).is_err() {
            return;
        }

        let block = 4096;
        let options = Options::new().with_mode(Mode::Standalone).with_block_size(block);
        let mut storage = vec![0u8; 2 * block];
        let buf = slice_at(&mut storage, block, 0, block);
        match tmp.as_file().direct_read_at_opt(buf, 0, &options) {
            Ok(state) => {
                assert_eq!(state.bytes_read, 600);
                assert_eq!(&buf[..600], &data[..]);
            }
            Err(Error::Read(e)) if e.raw_os_error() == Some(libc::EINVAL) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}
