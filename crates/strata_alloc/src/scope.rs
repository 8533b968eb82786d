//! # Scope Allocator
//!
//! Snapshot/restore wrapper over a [`LinearAllocator`].
//!
//! The arena's cursor is saved when the scope is created and written back
//! when it is dropped, which reclaims everything allocated through the scope
//! in O(1). No destructors run: this reclaims raw bytes, not objects.
//!
//! The scope mutably borrows its arena, so it cannot outlive it, and the
//! arena cannot be used directly while the scope is alive. Nested scopes
//! borrow their parent, which makes LIFO teardown a compile-time property.
//!
//! ```rust
//! use strata_alloc::{Allocator, LinearAllocator, LinearConfig, ScopeAllocator};
//!
//! let mut arena: LinearAllocator = LinearAllocator::new(&LinearConfig::default()).unwrap();
//! let before = arena.state();
//!
//! {
//!     let mut scratch = ScopeAllocator::new(&mut arena);
//!     for size in 1..=50 {
//!         scratch.alloc(size * 8).unwrap();
//!     }
//! }
//!
//! assert_eq!(arena.state(), before);
//! ```

use crate::allocator::{Allocator, Handle};
use crate::error::AllocResult;
use crate::header::AllocationHeader;
use crate::linear::{LinearAllocator, LinearState, DEFAULT_INLINE_PAGE_SIZE};

/// Temporary allocations over a linear allocator, reclaimed on drop.
pub struct ScopeAllocator<'a, const INLINE: usize = DEFAULT_INLINE_PAGE_SIZE> {
    /// The wrapped arena.
    arena: &'a mut LinearAllocator<INLINE>,
    /// Arena cursor at construction.
    snapshot: LinearState,
}

impl<'a, const INLINE: usize> ScopeAllocator<'a, INLINE> {
    /// Snapshots `arena` and wraps it.
    #[must_use]
    pub fn new(arena: &'a mut LinearAllocator<INLINE>) -> Self {
        let snapshot = arena.state();
        tracing::trace!(allocator = %arena.name(), ?snapshot, "scope opened");
        Self { arena, snapshot }
    }

    /// The cursor the arena returns to when this scope ends.
    #[inline]
    #[must_use]
    pub const fn snapshot(&self) -> LinearState {
        self.snapshot
    }

    /// Opens a scope inside this one.
    #[must_use]
    pub fn nested(&mut self) -> ScopeAllocator<'_, INLINE> {
        ScopeAllocator::new(&mut *self.arena)
    }

    /// Ends the scope, reclaiming everything allocated through it.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<const INLINE: usize> Allocator for ScopeAllocator<'_, INLINE> {
    fn name(&self) -> &str {
        self.arena.name()
    }

    fn aligned_alloc(&mut self, size: usize, alignment: usize) -> AllocResult<Handle> {
        self.arena.aligned_alloc(size, alignment)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> AllocResult<Handle> {
        self.arena.realloc(handle, new_size)
    }

    fn free(&mut self, handle: Handle) -> AllocResult<()> {
        self.arena.free(handle)
    }

    fn header(&self, handle: Handle) -> AllocResult<AllocationHeader> {
        self.arena.header(handle)
    }

    fn bytes(&self, handle: Handle) -> AllocResult<&[u8]> {
        self.arena.bytes(handle)
    }

    fn bytes_mut(&mut self, handle: Handle) -> AllocResult<&mut [u8]> {
        self.arena.bytes_mut(handle)
    }
}

impl<const INLINE: usize> Drop for ScopeAllocator<'_, INLINE> {
    fn drop(&mut self) {
        self.arena.restore(self.snapshot);
    }
}
