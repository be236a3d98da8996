//! # rdirect
//!
//! A VFS layer that makes file reads bypass the page cache using direct I/O.
//!
//! ## Overview
//!
//! `rdirect` sits in a pluggable I/O stack. On open it adds `O_DIRECT` to the
//! flags; on read it reconciles whatever buffer the caller hands in with the
//! alignment direct I/O demands:
//!
//! - The destination address is rounded up to the next block boundary
//! - The read is issued into that aligned window
//! - The received bytes are shifted back to the start of the caller's buffer
//!
//! The caller keeps an ordinary `pread` contract. An asynchronous
//! submit/receive interface is layered on top of the synchronous read.
//!
//! ## Modes
//!
//! - [`Mode::Passthrough`]: read through the caller's handle, which the open
//!   policy already flagged for direct I/O.
//! - [`Mode::Standalone`]: resolve the handle to a path via `/proc/self/fd`,
//!   reopen it with `O_DIRECT` and read the whole file in one call. Reads at
//!   any later offset return 0.
//!
//! ## Example
//!
//! ```no_run
//! use rdirect::{DirectRead, Mode, Options};
//! use std::path::Path;
//!
//! let path = Path::new("/path/to/file");
//! let mut buf = vec![0u8; 4096];
//!
//! // Simple read
//! let bytes_read = path.direct_read_at(&mut buf, 0).unwrap();
//!
//! // Read with options
//! let options = Options::new().with_mode(Mode::Standalone);
//! let state = path.direct_read_at_opt(&mut buf, 0, &options).unwrap();
//! println!("Read {} bytes, aligned view {:?}", state.bytes_read, state.view);
//! ```
//!
//! ## Limitations
//!
//! A buffer is only rejected when it is shorter than one block. Rounding the
//! address up can still leave less than a block to transfer, in which case
//! the read proceeds with the reduced length (see
//! [`Options::strict_alignment`] to reject it instead).

mod align;
mod error;
mod handle;
mod options;
mod policy;
mod reader;
mod registry;
mod request;
mod state;
mod vfs;

pub use align::{align, align_slice, round_down, round_up, AlignedView, LengthPolicy};
pub use error::{Error, Result};
pub use handle::{open_direct, resolve_path, DirectHandle, HandleSource, Passthrough, Standalone};
pub use options::{Mode, Options, DEFAULT_BLOCK_SIZE};
pub use policy::OpenPolicy;
pub use reader::DirectRead;
pub use registry::{register_rdirect, Registry, MODULE_NAME};
pub use request::PreadRequest;
pub use state::State;
pub use vfs::{PosixVfs, RDirect, VfsOps};
