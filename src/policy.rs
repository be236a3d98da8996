//! Open-time policy that forces direct I/O.

/// Decides which opens get `O_DIRECT`.
///
/// Directories are left alone, and so are opens that carry a non-zero
/// creation mode: special files such as descriptor links under
/// `/proc/self/fd` are opened that way and must not be forced into direct
/// I/O. Everything else is opened with `O_DIRECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPolicy {
    enabled: bool,
}

impl Default for OpenPolicy {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl OpenPolicy {
    /// Policy that adds `O_DIRECT` where applicable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that never touches the flags.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Whether an open with these `flags` and `mode` should use direct I/O.
    pub fn wants_direct(&self, flags: i32, mode: u32) -> bool {
        self.enabled && flags & libc::O_DIRECTORY == 0 && mode == 0
    }

    /// Return `flags` with `O_DIRECT` added when the policy applies.
    pub fn apply(&self, flags: i32, mode: u32) -> i32 {
        if self.wants_direct(flags, mode) {
            flags | libc::O_DIRECT
        } else {
            flags
        }
    }
}
