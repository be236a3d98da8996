//! Configuration options for direct reads.

use crate::align::LengthPolicy;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Default device block size.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// How the direct-I/O handle for a read is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Read through the handle the caller opened; the open policy already
    /// set `O_DIRECT` on it.
    #[default]
    Passthrough,
    /// Resolve the handle to a path and reopen it with `O_DIRECT` for a
    /// single whole-file read. Reads at a non-zero offset return 0.
    Standalone,
}

impl Mode {
    /// Length policy applied after the destination address is rounded up.
    pub fn length_policy(self) -> LengthPolicy {
        match self {
            Mode::Passthrough => LengthPolicy::AsIs,
            Mode::Standalone => LengthPolicy::RoundDown,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Passthrough => f.write_str("passthrough"),
            Mode::Standalone => f.write_str("standalone"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" => Ok(Mode::Passthrough),
            "standalone" => Ok(Mode::Standalone),
            other => Err(format!(
                "unknown mode '{}', expected 'passthrough' or 'standalone'",
                other
            )),
        }
    }
}

/// Options for controlling the read behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Device block size. Must be a non-zero power of two.
    pub block_size: usize,

    /// Operating mode.
    pub mode: Mode,

    /// Reopen with `O_DIRECT` in standalone mode.
    ///
    /// When disabled the reopened handle uses the page cache. Every
    /// alignment step still runs, which keeps results comparable on
    /// filesystems that reject `O_DIRECT`.
    pub direct_io: bool,

    /// Write a NUL byte right after the received data in standalone mode.
    ///
    /// The terminator needs one byte of capacity past the data, so when
    /// enabled the last byte of the destination slice is reserved and the
    /// read is sized over `len - 1` bytes.
    pub nul_terminate: bool,

    /// Fail with [`Error::InsufficientBuffer`] when rounding leaves less
    /// than one block to transfer.
    ///
    /// When disabled (default), the read proceeds with the reduced length
    /// and may return far fewer bytes than requested.
    pub strict_alignment: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            mode: Mode::Passthrough,
            direct_io: true,
            nul_terminate: false,
            strict_alignment: false,
        }
    }
}

impl Options {
    /// Create a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the operating mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable `O_DIRECT` on the standalone reopen.
    pub fn with_direct_io(mut self, direct: bool) -> Self {
        self.direct_io = direct;
        self
    }

    /// Enable or disable the standalone NUL terminator.
    pub fn with_nul_terminate(mut self, terminate: bool) -> Self {
        self.nul_terminate = terminate;
        self
    }

    /// Enable or disable rejecting reads truncated below one block.
    pub fn with_strict_alignment(mut self, strict: bool) -> Self {
        self.strict_alignment = strict;
        self
    }

    /// Check that the options are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two() {
            return Err(Error::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }

    /// Validate and return self.
    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}
