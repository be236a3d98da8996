//! Block alignment arithmetic for direct I/O destinations.
//!
//! Direct I/O needs the destination address, the transfer length and the
//! file offset to be multiples of the device block size. Callers hand us an
//! arbitrary slice, so the read is issued into the largest block-aligned
//! window inside it and shifted back afterwards.
//!
//! ```text
//!   buf.as_ptr()        aligned address
//!   │◄── rounding ──►│◄──────── aligned length ────────►│
//!   ┌────────────────┬──────────────────────────────────┐
//!   │    skipped     │        read lands here           │
//!   └────────────────┴──────────────────────────────────┘
//! ```

/// How the usable length is treated after the address has been rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPolicy {
    /// Keep `length - rounding` as is. The next layer must accept it.
    AsIs,
    /// Round `length - rounding` down to a whole number of blocks.
    RoundDown,
}

/// Aligned window inside a caller buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedView {
    /// First block-aligned address at or above the buffer start.
    pub address: usize,
    /// Number of bytes available for the transfer starting at `address`.
    pub length: usize,
    /// `address - buffer start`, always below the block size.
    pub rounding: usize,
}

impl AlignedView {
    /// Whether rounding left less than one full block to transfer.
    pub fn is_truncated(&self, block_size: usize) -> bool {
        self.length < block_size
    }
}

/// Round `value` up to the next multiple of `block_size`.
///
/// `block_size` must be a power of two.
#[inline]
pub fn round_up(value: usize, block_size: usize) -> usize {
    debug_assert!(block_size.is_power_of_two());
    (value + (block_size - 1)) & !(block_size - 1)
}

/// Round `value` down to a multiple of `block_size`.
#[inline]
pub fn round_down(value: usize, block_size: usize) -> usize {
    debug_assert!(block_size.is_power_of_two());
    value & !(block_size - 1)
}

/// Compute the aligned window for a buffer at `address` spanning `length` bytes.
///
/// No minimum length is enforced here; a `length` shorter than the rounding
/// yields an empty window. Callers reject buffers below one block before
/// getting this far.
pub fn align(address: usize, length: usize, block_size: usize, policy: LengthPolicy) -> AlignedView {
    let aligned = round_up(address, block_size);
    let rounding = aligned - address;
    let mut usable = length.saturating_sub(rounding);
    if policy == LengthPolicy::RoundDown {
        usable = round_down(usable, block_size);
    }

    AlignedView {
        address: aligned,
        length: usable,
        rounding,
    }
}

/// Compute the aligned window for a byte slice.
pub fn align_slice(buf: &[u8], block_size: usize, policy: LengthPolicy) -> AlignedView {
    align(buf.as_ptr() as usize, buf.len(), block_size, policy)
}
