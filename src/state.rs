//! State returned from read operations.

use crate::align::AlignedView;
use std::path::PathBuf;

/// Result state from a read operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Number of bytes delivered to the start of the caller's buffer.
    pub bytes_read: usize,

    /// Aligned window the read was issued into. `None` when no read was issued.
    pub view: Option<AlignedView>,

    /// Path the file was reopened from (standalone mode).
    pub path: Option<PathBuf>,

    /// Whether zero bytes were returned because standalone mode only serves
    /// the read at offset 0.
    pub end_of_file_by_policy: bool,
}

impl State {
    /// Create a State for a read that was issued.
    pub fn new(bytes_read: usize, view: AlignedView, path: Option<PathBuf>) -> Self {
        Self {
            bytes_read,
            view: Some(view),
            path,
            end_of_file_by_policy: false,
        }
    }

    /// Create a State for a standalone read past offset 0.
    pub fn end_of_file() -> Self {
        Self {
            bytes_read: 0,
            view: None,
            path: None,
            end_of_file_by_policy: true,
        }
    }

    /// Whether rounding cut the transfer below one block.
    pub fn truncated(&self, block_size: usize) -> bool {
        self.view.is_some_and(|view| view.is_truncated(block_size))
    }
}
