//! # Allocation Header
//!
//! Metadata record placed in the backing bytes immediately before every
//! usable region handed out by an allocator.
//!
//! ```text
//!   start            offset - HEADER_SIZE      offset               offset + size
//!     │   padding          │      header          │     usable bytes      │
//!     ├────────────────────┼──────────────────────┼───────────────────────┤
//! ```
//!
//! The header is recovered by arithmetic from the handle's offset, never from
//! a side table, so the layout is `#[repr(C)]` and plain-old-data.

use bytemuck::{Pod, Zeroable};

use crate::error::{AllocError, AllocResult};

/// Metadata describing one live allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct AllocationHeader {
    /// First byte of the region backing this allocation, padding included.
    pub start: usize,
    /// Usable size in bytes, not counting the header.
    pub size: usize,
    /// Alignment requested at allocation time.
    pub alignment: usize,
    /// Copy of the usable region's offset, checked on `free`/`realloc`.
    pub self_offset: usize,
}

/// Size in bytes of an encoded [`AllocationHeader`].
pub const HEADER_SIZE: usize = core::mem::size_of::<AllocationHeader>();

impl AllocationHeader {
    /// Bytes owned by the allocation, from `start` through the end of the
    /// usable region.
    #[inline]
    #[must_use]
    pub const fn span(&self) -> usize {
        self.self_offset + self.size - self.start
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two. Returns `None` on overflow.
#[inline]
#[must_use]
pub(crate) const fn align_up(value: usize, alignment: usize) -> Option<usize> {
    match value.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// Rejects zero sizes and alignments that are not a power of two.
pub(crate) fn check_request(allocator: &str, size: usize, alignment: usize) -> AllocResult<()> {
    if !alignment.is_power_of_two() {
        return Err(AllocError::InvalidAlignment {
            allocator: allocator.to_owned(),
            alignment,
        }
        .logged());
    }
    if size == 0 {
        return Err(AllocError::ZeroSize {
            allocator: allocator.to_owned(),
        }
        .logged());
    }
    Ok(())
}

/// Encodes `header` into the bytes just before `offset`.
pub(crate) fn write_header(bytes: &mut [u8], offset: usize, header: &AllocationHeader) {
    bytes[offset - HEADER_SIZE..offset].copy_from_slice(bytemuck::bytes_of(header));
}

/// Wipes the header before `offset` so stale handles stop validating.
pub(crate) fn clear_header(bytes: &mut [u8], offset: usize) {
    bytes[offset - HEADER_SIZE..offset].fill(0);
}

/// Decodes the header before `offset`.
///
/// Bounds are always checked. With `validate` set, the self-offset and the
/// alignment of `offset` must also match.
pub(crate) fn read_header(bytes: &[u8], offset: usize, validate: bool) -> Option<AllocationHeader> {
    let header_start = offset.checked_sub(HEADER_SIZE)?;
    let raw = bytes.get(header_start..offset)?;
    let header: AllocationHeader = bytemuck::pod_read_unaligned(raw);

    if !header.alignment.is_power_of_two() || header.start > header_start {
        return None;
    }
    if offset.checked_add(header.size)? > bytes.len() {
        return None;
    }
    if validate
        && (header.self_offset != offset || header.size == 0 || offset % header.alignment != 0)
    {
        return None;
    }
    Some(header)
}
