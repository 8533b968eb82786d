//! # Allocator Contract
//!
//! The interface every allocator in the family implements, and that all
//! consumer code (containers, subsystems) is written against.
//!
//! Allocations are identified by [`Handle`]s rather than raw pointers. The
//! memory behind a handle is reached through [`Allocator::bytes`] and
//! [`Allocator::bytes_mut`], or typed through [`Allocator::construct`] and
//! [`Allocator::read`].
//!
//! ## Alignment
//!
//! Alignment is measured from the start of the backing page, not in the
//! address space. Backing pages are plain byte buffers, so a slice returned by
//! [`Allocator::bytes`] carries no address alignment guarantee. Decode with
//! `bytemuck::pod_read_unaligned` (which [`Allocator::read`] does), never with
//! `bytemuck::from_bytes` or `cast_slice`, which panic on a misaligned slice.

use bytemuck::Pod;

use crate::error::{AllocError, AllocResult};
use crate::header::AllocationHeader;

/// Alignment used by [`Allocator::alloc`].
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Opaque reference to a live allocation.
///
/// `offset` is the position of the usable region inside the allocator's
/// backing page, so `offset % alignment == 0` for the requested alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    /// Backing page the allocation lives in.
    page: usize,
    /// Byte offset of the usable region within the page.
    offset: usize,
}

impl Handle {
    /// Builds a handle from its raw parts.
    ///
    /// Nothing is validated here; an allocator rejects handles it did not
    /// issue with [`AllocError::InvalidHandle`] when they are used.
    #[inline]
    #[must_use]
    pub const fn from_raw(page: usize, offset: usize) -> Self {
        Self { page, offset }
    }

    /// Backing page index.
    #[inline]
    #[must_use]
    pub const fn page(self) -> usize {
        self.page
    }

    /// Byte offset of the usable region within its page.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }
}

/// Shared allocator contract.
///
/// Every failure is logged by the allocator before it is returned.
pub trait Allocator {
    /// Name used in log lines and errors.
    fn name(&self) -> &str;

    /// Allocates `size` usable bytes aligned to `alignment`.
    ///
    /// # Errors
    ///
    /// - [`AllocError::InvalidAlignment`] if `alignment` is not a power of two
    /// - [`AllocError::ZeroSize`] if `size` is zero
    /// - [`AllocError::OutOfMemory`] / [`AllocError::SystemAllocation`] when no space is left
    fn aligned_alloc(&mut self, size: usize, alignment: usize) -> AllocResult<Handle>;

    /// Resizes a live allocation, preserving the lesser of the old and new
    /// contents. May return the same handle or a relocated one.
    ///
    /// # Errors
    ///
    /// Fails on zero size, foreign handles, or lack of space. A failed
    /// `realloc` leaves the original allocation untouched.
    fn realloc(&mut self, handle: Handle, new_size: usize) -> AllocResult<Handle>;

    /// Releases a live allocation.
    ///
    /// # Errors
    ///
    /// Fails on handles that do not name a live allocation.
    fn free(&mut self, handle: Handle) -> AllocResult<()>;

    /// Recovers the header stored in front of `handle`.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidHandle`] if no valid header sits there.
    fn header(&self, handle: Handle) -> AllocResult<AllocationHeader>;

    /// The usable bytes of a live allocation.
    ///
    /// The slice is aligned relative to its page only; read typed values out
    /// of it unaligned.
    ///
    /// ```rust
    /// use strata_alloc::{Allocator, FreeListAllocator, FreeListConfig};
    ///
    /// let mut general = FreeListAllocator::new(&FreeListConfig::new("general", 1024)).unwrap();
    /// let handle = general.aligned_alloc(8, 8).unwrap();
    /// general.bytes_mut(handle).unwrap().copy_from_slice(&7u64.to_ne_bytes());
    ///
    /// let value: u64 = bytemuck::pod_read_unaligned(general.bytes(handle).unwrap());
    /// assert_eq!(value, 7);
    /// ```
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidHandle`] for foreign or stale handles.
    fn bytes(&self, handle: Handle) -> AllocResult<&[u8]>;

    /// The usable bytes of a live allocation, mutably.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidHandle`] for foreign or stale handles.
    fn bytes_mut(&mut self, handle: Handle) -> AllocResult<&mut [u8]>;

    /// Same as `aligned_alloc(size, DEFAULT_ALIGNMENT)`.
    ///
    /// # Errors
    ///
    /// See [`Allocator::aligned_alloc`].
    fn alloc(&mut self, size: usize) -> AllocResult<Handle> {
        self.aligned_alloc(size, DEFAULT_ALIGNMENT)
    }

    /// [`Allocator::alloc`] followed by zero-filling the usable region.
    ///
    /// # Errors
    ///
    /// See [`Allocator::aligned_alloc`].
    fn alloc_zero(&mut self, size: usize) -> AllocResult<Handle> {
        let handle = self.alloc(size)?;
        self.bytes_mut(handle)?.fill(0);
        Ok(handle)
    }

    /// Allocates room for a `T` and writes `value` into it.
    ///
    /// # Errors
    ///
    /// See [`Allocator::aligned_alloc`].
    fn construct<T: Pod>(&mut self, value: T) -> AllocResult<Handle>
    where
        Self: Sized,
    {
        let size = core::mem::size_of::<T>();
        let handle = self.alloc(size.max(1))?;
        self.bytes_mut(handle)?[..size].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(handle)
    }

    /// Reads back a `T` previously written with [`Allocator::construct`].
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidHandle`] if the handle is stale or its region is
    /// smaller than a `T`.
    fn read<T: Pod>(&self, handle: Handle) -> AllocResult<T>
    where
        Self: Sized,
    {
        let size = core::mem::size_of::<T>();
        let bytes = self.bytes(handle)?;
        match bytes.get(..size) {
            Some(raw) => Ok(bytemuck::pod_read_unaligned(raw)),
            None => Err(AllocError::InvalidHandle {
                allocator: self.name().to_owned(),
                handle,
            }
            .logged()),
        }
    }
}
