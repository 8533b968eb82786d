//! # Free-List Allocator
//!
//! General-purpose allocator over one fixed-size backing buffer.
//!
//! ```text
//!   ┌──────────┬─────────────┬──────────┬───────────────┬────────────────┐
//!   │ hdr│ A   │    free     │ hdr│ B   │     free      │ hdr│ C         │
//!   └──────────┴─────────────┴──────────┴───────────────┴────────────────┘
//!                    ▲                         ▲
//!                    └──── free list ──────────┘   (sorted by offset)
//! ```
//!
//! - Allocation is best-fit: the whole free list is scanned and the smallest
//!   block that can hold padding + header + payload wins.
//! - Remainders smaller than a header are absorbed into the allocation.
//! - Freeing merges with address-contiguous neighbours.
//! - A relocating `realloc` that finds no room undoes its speculative free,
//!   leaving the free list and the original allocation exactly as they were.
//!
//! # Thread Safety
//!
//! This allocator is NOT thread-safe. Use one allocator per thread or wrap it
//! in a lock.

use crate::allocator::{Allocator, Handle};
use crate::config::FreeListConfig;
use crate::error::{AllocError, AllocResult};
use crate::header::{self, AllocationHeader, HEADER_SIZE};

/// A free region of the backing buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
    offset: usize,
    size: usize,
}

// Any allocation, however small, must leave room for a free-block record.
const _: () = assert!(HEADER_SIZE >= core::mem::size_of::<FreeBlock>());

impl FreeBlock {
    /// First byte of the block.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }

    /// One past the last byte of the block.
    #[inline]
    #[must_use]
    pub const fn end(self) -> usize {
        self.offset + self.size
    }
}

/// Where a request lands: the chosen free block and the usable offset in it.
#[derive(Clone, Copy)]
struct Fit {
    index: usize,
    offset: usize,
}

/// How a span was returned to the free list, so it can be taken back.
enum Release {
    Inserted(usize),
    ExtendedPrev { index: usize, size: usize },
    ExtendedNext { index: usize, block: FreeBlock },
    Bridged { index: usize, size: usize, next: FreeBlock },
}

/// Best-fit allocator with coalescing over a fixed backing buffer.
///
/// # Example
///
/// ```rust
/// use strata_alloc::{Allocator, FreeListAllocator, FreeListConfig};
///
/// let mut general = FreeListAllocator::new(&FreeListConfig::new("general", 1024)).unwrap();
///
/// let handle = general.alloc(100).unwrap();
/// general.bytes_mut(handle).unwrap()[0] = 7;
/// general.free(handle).unwrap();
///
/// assert_eq!(general.used_size(), 0);
/// ```
pub struct FreeListAllocator {
    /// Name used in log lines and errors.
    name: String,
    /// The backing buffer, allocated once.
    buffer: Box<[u8]>,
    /// Bytes owned by live allocations, headers and padding included.
    used_size: usize,
    /// Free blocks in ascending offset order, never adjacent to each other.
    free_list: Vec<FreeBlock>,
    /// Check header self-offsets on `free`/`realloc`.
    validate_headers: bool,
}

impl FreeListAllocator {
    /// Allocates the backing buffer and covers it with one free block.
    ///
    /// # Errors
    ///
    /// - [`AllocError::ZeroSize`] if `total_size` is zero
    /// - [`AllocError::SystemAllocation`] if the buffer cannot be reserved
    pub fn new(config: &FreeListConfig) -> AllocResult<Self> {
        let total_size = config.total_size;
        if total_size == 0 {
            return Err(AllocError::ZeroSize {
                allocator: config.name.clone(),
            }
            .logged());
        }

        let mut storage = Vec::new();
        storage.try_reserve_exact(total_size).map_err(|_| {
            AllocError::SystemAllocation {
                allocator: config.name.clone(),
                size: total_size,
            }
            .logged()
        })?;
        storage.resize(total_size, 0);

        tracing::debug!(allocator = %config.name, total_size, "free-list allocator initialized");

        Ok(Self {
            name: config.name.clone(),
            buffer: storage.into_boxed_slice(),
            used_size: 0,
            free_list: vec![FreeBlock {
                offset: 0,
                size: total_size,
            }],
            validate_headers: config.validate_headers,
        })
    }

    /// Size of the backing buffer in bytes.
    #[inline]
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes owned by live allocations, headers and padding included.
    #[inline]
    #[must_use]
    pub const fn used_size(&self) -> usize {
        self.used_size
    }

    /// Bytes tracked by the free list.
    #[inline]
    #[must_use]
    pub fn free_size(&self) -> usize {
        self.total_size() - self.used_size
    }

    /// Free blocks in ascending offset order.
    pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
        self.free_list.iter().copied()
    }

    /// Size of the largest free block, 0 when full.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        self.free_list.iter().map(|b| b.size).max().unwrap_or(0)
    }

    /// Releases the backing buffer, reporting any bytes still in use.
    pub fn destroy(self) {
        drop(self);
    }

    fn invalid_handle(&self, handle: Handle) -> AllocError {
        AllocError::InvalidHandle {
            allocator: self.name.clone(),
            handle,
        }
        .logged()
    }

    fn out_of_memory(&self, requested: usize) -> AllocError {
        AllocError::OutOfMemory {
            allocator: self.name.clone(),
            requested,
        }
        .logged()
    }

    fn double_free(&self, handle: Handle) -> AllocError {
        AllocError::DoubleFree {
            allocator: self.name.clone(),
            handle,
        }
        .logged()
    }

    fn decode_header(&self, handle: Handle) -> Option<AllocationHeader> {
        if handle.page() != 0 {
            return None;
        }
        header::read_header(&self.buffer, handle.offset(), self.validate_headers)
    }

    fn live_header(&self, handle: Handle) -> AllocResult<AllocationHeader> {
        self.decode_header(handle).ok_or_else(|| self.invalid_handle(handle))
    }

    /// Whether the header slot in front of `handle` lies in a free block.
    fn header_slot_is_free(&self, handle: Handle) -> bool {
        let Some(slot) = handle.offset().checked_sub(HEADER_SIZE) else {
            return false;
        };
        handle.page() == 0
            && self
                .free_list
                .iter()
                .any(|b| b.offset <= slot && slot < b.end())
    }

    /// Smallest free block that holds `size` bytes at `alignment`.
    fn find_fit(&self, size: usize, alignment: usize) -> Option<Fit> {
        let mut best: Option<(Fit, usize)> = None;

        for (index, block) in self.free_list.iter().enumerate() {
            let Some(offset) = block
                .offset
                .checked_add(HEADER_SIZE)
                .and_then(|first| header::align_up(first, alignment))
            else {
                continue;
            };
            let Some(end) = offset.checked_add(size) else {
                continue;
            };
            if end > block.end() {
                continue;
            }
            if best.map_or(true, |(_, best_size)| block.size < best_size) {
                best = Some((Fit { index, offset }, block.size));
            }
        }

        best.map(|(fit, _)| fit)
    }

    /// Takes the fitted span out of the free list and accounts for it.
    ///
    /// The header is returned, not written, so a relocation can move the
    /// payload first.
    fn claim(&mut self, fit: Fit, size: usize, alignment: usize) -> AllocationHeader {
        let block = self.free_list[fit.index];
        let end = fit.offset + size;
        let remainder = block.end() - end;

        let size = if remainder < HEADER_SIZE {
            self.free_list.remove(fit.index);
            size + remainder
        } else {
            self.free_list[fit.index] = FreeBlock {
                offset: end,
                size: remainder,
            };
            size
        };

        let header = AllocationHeader {
            start: block.offset,
            size,
            alignment,
            self_offset: fit.offset,
        };
        self.used_size += header.span();
        header
    }

    fn overlaps_free(&self, start: usize, end: usize) -> bool {
        let pos = self.free_list.partition_point(|b| b.offset < start);
        let prev_overlaps = pos > 0 && self.free_list[pos - 1].end() > start;
        let next_overlaps = self.free_list.get(pos).is_some_and(|b| b.offset < end);
        prev_overlaps || next_overlaps
    }

    /// Returns `[start, end)` to the free list, merging with neighbours.
    fn release(&mut self, start: usize, end: usize) -> Release {
        let pos = self.free_list.partition_point(|b| b.offset < start);
        let merges_prev = pos > 0 && self.free_list[pos - 1].end() == start;
        let merges_next = self.free_list.get(pos).is_some_and(|b| b.offset == end);
        let len = end - start;

        match (merges_prev, merges_next) {
            (true, true) => {
                let next = self.free_list.remove(pos);
                let prev = &mut self.free_list[pos - 1];
                let size = prev.size;
                prev.size += len + next.size;
                Release::Bridged {
                    index: pos - 1,
                    size,
                    next,
                }
            }
            (true, false) => {
                let prev = &mut self.free_list[pos - 1];
                let size = prev.size;
                prev.size += len;
                Release::ExtendedPrev {
                    index: pos - 1,
                    size,
                }
            }
            (false, true) => {
                let block = self.free_list[pos];
                self.free_list[pos] = FreeBlock {
                    offset: start,
                    size: len + block.size,
                };
                Release::ExtendedNext { index: pos, block }
            }
            (false, false) => {
                self.free_list.insert(pos, FreeBlock { offset: start, size: len });
                Release::Inserted(pos)
            }
        }
    }

    fn undo_release(&mut self, release: Release) {
        match release {
            Release::Inserted(index) => {
                self.free_list.remove(index);
            }
            Release::ExtendedPrev { index, size } => self.free_list[index].size = size,
            Release::ExtendedNext { index, block } => self.free_list[index] = block,
            Release::Bridged { index, size, next } => {
                self.free_list[index].size = size;
                self.free_list.insert(index + 1, next);
            }
        }
    }

    /// Moves a live allocation to a new best-fit block of `new_size` bytes.
    fn relocate(
        &mut self,
        handle: Handle,
        old: AllocationHeader,
        new_size: usize,
    ) -> AllocResult<Handle> {
        let old_offset = handle.offset();
        let old_end = old_offset + old.size;

        // Measured from the handle: `self_offset` is unchecked without validation.
        let saved_used = self.used_size;
        self.used_size -= old_end - old.start;
        let release = self.release(old.start, old_end);

        let Some(fit) = self.find_fit(new_size, old.alignment) else {
            self.undo_release(release);
            self.used_size = saved_used;
            return Err(self.out_of_memory(new_size));
        };

        let moved = self.claim(fit, new_size, old.alignment);
        header::clear_header(&mut self.buffer, old_offset);
        self.buffer
            .copy_within(old_offset..old_end, moved.self_offset);
        header::write_header(&mut self.buffer, moved.self_offset, &moved);

        tracing::trace!(
            allocator = %self.name,
            from = old_offset,
            to = moved.self_offset,
            new_size,
            "relocated allocation"
        );
        Ok(Handle::from_raw(0, moved.self_offset))
    }
}

impl Allocator for FreeListAllocator {
    fn name(&self) -> &str {
        &self.name
    }

    fn aligned_alloc(&mut self, size: usize, alignment: usize) -> AllocResult<Handle> {
        header::check_request(&self.name, size, alignment)?;

        let Some(fit) = self.find_fit(size, alignment) else {
            return Err(self.out_of_memory(size));
        };
        let header = self.claim(fit, size, alignment);
        header::write_header(&mut self.buffer, header.self_offset, &header);

        tracing::trace!(allocator = %self.name, offset = header.self_offset, size, "alloc");
        Ok(Handle::from_raw(0, header.self_offset))
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> AllocResult<Handle> {
        let mut header = self.live_header(handle)?;
        if self.overlaps_free(header.start, handle.offset() + header.size) {
            return Err(self.invalid_handle(handle));
        }
        if new_size == 0 {
            return Err(AllocError::ZeroSize {
                allocator: self.name.clone(),
            }
            .logged());
        }
        if header
            .size
            .checked_add(self.free_size())
            .is_some_and(|limit| new_size > limit)
        {
            return Err(self.out_of_memory(new_size));
        }
        if new_size == header.size {
            return Ok(handle);
        }

        let offset = handle.offset();
        let end = offset + header.size;
        let pos = self.free_list.partition_point(|b| b.offset < end);
        let following = self.free_list.get(pos).copied().filter(|b| b.offset == end);

        if new_size < header.size {
            let released = header.size - new_size;
            let new_end = offset + new_size;
            if let Some(next) = following {
                self.free_list[pos] = FreeBlock {
                    offset: new_end,
                    size: next.size + released,
                };
            } else if released < HEADER_SIZE {
                // Too small for a free block of its own; keep it as slack.
                return Ok(handle);
            } else {
                self.free_list.insert(
                    pos,
                    FreeBlock {
                        offset: new_end,
                        size: released,
                    },
                );
            }
            self.used_size -= released;
            header.size = new_size;
            header::write_header(&mut self.buffer, offset, &header);
            return Ok(handle);
        }

        let extra = new_size - header.size;
        if let Some(next) = following.filter(|b| b.size >= extra) {
            let remainder = next.size - extra;
            if remainder < HEADER_SIZE {
                self.free_list.remove(pos);
                header.size += next.size;
                self.used_size += next.size;
            } else {
                self.free_list[pos] = FreeBlock {
                    offset: end + extra,
                    size: remainder,
                };
                header.size = new_size;
                self.used_size += extra;
            }
            header::write_header(&mut self.buffer, offset, &header);
            return Ok(handle);
        }

        self.relocate(handle, header, new_size)
    }

    fn free(&mut self, handle: Handle) -> AllocResult<()> {
        let Some(header) = self.decode_header(handle) else {
            // A freed allocation's header was wiped and its slot returned to the free list.
            return Err(if self.header_slot_is_free(handle) {
                self.double_free(handle)
            } else {
                self.invalid_handle(handle)
            });
        };
        let start = header.start;
        let end = handle.offset() + header.size;

        if self.overlaps_free(start, end) {
            return Err(self.double_free(handle));
        }

        header::clear_header(&mut self.buffer, handle.offset());
        self.used_size -= end - start;
        self.release(start, end);

        tracing::trace!(allocator = %self.name, offset = handle.offset(), "free");
        Ok(())
    }

    fn header(&self, handle: Handle) -> AllocResult<AllocationHeader> {
        self.live_header(handle)
    }

    fn bytes(&self, handle: Handle) -> AllocResult<&[u8]> {
        let header = self.live_header(handle)?;
        let offset = handle.offset();
        Ok(&self.buffer[offset..offset + header.size])
    }

    fn bytes_mut(&mut self, handle: Handle) -> AllocResult<&mut [u8]> {
        let header = self.live_header(handle)?;
        let offset = handle.offset();
        Ok(&mut self.buffer[offset..offset + header.size])
    }
}

impl Drop for FreeListAllocator {
    fn drop(&mut self) {
        if self.used_size > 0 {
            tracing::warn!(
                allocator = %self.name,
                used_size = self.used_size,
                "free-list allocator destroyed with live allocations"
            );
        } else {
            tracing::debug!(allocator = %self.name, "free-list allocator destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(total_size: usize) -> FreeListAllocator {
        let mut config = FreeListConfig::new("test", total_size);
        config.validate_headers = true;
        FreeListAllocator::new(&config).unwrap()
    }

    fn assert_conserved(alloc: &FreeListAllocator) {
        let free: usize = alloc.free_blocks().map(FreeBlock::size).sum();
        assert_eq!(alloc.used_size() + free, alloc.total_size());
    }

    fn blocks(alloc: &FreeListAllocator) -> Vec<(usize, usize)> {
        alloc.free_blocks().map(|b| (b.offset(), b.size())).collect()
    }

    fn fill(alloc: &mut FreeListAllocator, handle: Handle) {
        for (i, byte) in alloc.bytes_mut(handle).unwrap().iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
    }

    fn assert_filled(alloc: &FreeListAllocator, handle: Handle, len: usize) {
        let bytes = alloc.bytes(handle).unwrap();
        for (i, byte) in bytes[..len].iter().enumerate() {
            assert_eq!(*byte, (i % 251) as u8, "byte {i} changed");
        }
    }

    #[test]
    fn test_init_single_block() {
        let alloc = allocator(1024);
        assert_eq!(blocks(&alloc), vec![(0, 1024)]);
        assert_eq!(alloc.used_size(), 0);
        assert_eq!(alloc.largest_free_block(), 1024);
    }

    #[test]
    fn test_init_zero_size() {
        let err = FreeListAllocator::new(&FreeListConfig::new("empty", 0)).err();
        assert!(matches!(err, Some(AllocError::ZeroSize { .. })));
    }

    #[test]
    fn test_init_system_refusal() {
        let err = FreeListAllocator::new(&FreeListConfig::new("huge", usize::MAX)).err();
        assert!(matches!(err, Some(AllocError::SystemAllocation { .. })));
    }

    #[test]
    fn test_alloc_free_reuses_address() {
        let mut alloc = allocator(1024);

        let first = alloc.alloc(100).unwrap();
        assert_eq!(first.offset(), HEADER_SIZE);
        assert_eq!(alloc.used_size(), HEADER_SIZE + 100);
        assert_conserved(&alloc);

        alloc.free(first).unwrap();
        assert_eq!(alloc.used_size(), 0);
        assert_eq!(blocks(&alloc), vec![(0, 1024)]);

        let second = alloc.alloc(100).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_best_fit_prefers_smallest_block() {
        let mut alloc = allocator(2048);

        let a = alloc.alloc(500).unwrap();
        let _b = alloc.alloc(100).unwrap();
        let c = alloc.alloc(200).unwrap();
        let _d = alloc.alloc(100).unwrap();

        alloc.free(a).unwrap();
        alloc.free(c).unwrap();
        assert_eq!(alloc.free_blocks().count(), 3);

        // Both the old `a` block and the tail fit, the old `c` block is smallest.
        let e = alloc.alloc(150).unwrap();
        assert_eq!(e, c);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_coalesce_in_either_order() {
        for forward in [true, false] {
            let mut alloc = allocator(1024);
            let a = alloc.alloc(100).unwrap();
            let b = alloc.alloc(100).unwrap();
            let c = alloc.alloc(100).unwrap();

            let span_start = alloc.header(a).unwrap().start;
            let span_end = b.offset() + alloc.header(b).unwrap().size;

            if forward {
                alloc.free(a).unwrap();
                alloc.free(b).unwrap();
            } else {
                alloc.free(b).unwrap();
                alloc.free(a).unwrap();
            }

            let free = blocks(&alloc);
            assert_eq!(free.len(), 2);
            assert_eq!(free[0], (span_start, span_end - span_start));
            assert_conserved(&alloc);

            alloc.free(c).unwrap();
            assert_eq!(blocks(&alloc), vec![(0, 1024)]);
        }
    }

    #[test]
    fn test_alignment_and_header_recovery() {
        let mut alloc = allocator(64 * 1024);

        let mut alignment = 1;
        while alignment <= 1024 {
            let handle = alloc.aligned_alloc(40, alignment).unwrap();
            assert_eq!(handle.offset() % alignment, 0);

            let header = alloc.header(handle).unwrap();
            assert_eq!(header.size, 40);
            assert_eq!(header.alignment, alignment);
            assert_eq!(header.self_offset, handle.offset());
            assert!(header.start + HEADER_SIZE <= handle.offset());

            alignment *= 2;
        }
        assert_conserved(&alloc);
    }

    #[test]
    fn test_small_remainder_absorbed() {
        let mut alloc = allocator(1024);
        let handle = alloc.alloc(1024 - HEADER_SIZE - 12).unwrap();

        assert_eq!(alloc.header(handle).unwrap().size, 1024 - HEADER_SIZE);
        assert_eq!(alloc.free_blocks().count(), 0);
        assert_eq!(alloc.used_size(), 1024);

        assert!(matches!(alloc.alloc(1), Err(AllocError::OutOfMemory { .. })));
    }

    #[test]
    fn test_invalid_requests() {
        let mut alloc = allocator(1024);
        assert!(matches!(
            alloc.aligned_alloc(64, 3),
            Err(AllocError::InvalidAlignment { alignment: 3, .. })
        ));
        assert!(matches!(alloc.alloc(0), Err(AllocError::ZeroSize { .. })));
        assert!(matches!(alloc.alloc(4096), Err(AllocError::OutOfMemory { .. })));
        assert_eq!(alloc.used_size(), 0);
    }

    #[test]
    fn test_foreign_and_stale_handles() {
        let mut alloc = allocator(1024);
        let handle = alloc.alloc(64).unwrap();

        assert!(matches!(
            alloc.free(Handle::from_raw(1, handle.offset())),
            Err(AllocError::InvalidHandle { .. })
        ));
        assert!(matches!(
            alloc.free(Handle::from_raw(0, handle.offset() + 16)),
            Err(AllocError::InvalidHandle { .. })
        ));
        assert!(alloc.free(Handle::from_raw(0, 4000)).is_err());

        alloc.free(handle).unwrap();
        assert!(alloc.free(handle).is_err());
        assert!(alloc.realloc(handle, 10).is_err());
        assert_eq!(alloc.used_size(), 0);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_double_free() {
        for validate_headers in [true, false] {
            let mut config = FreeListConfig::new("test", 1024);
            config.validate_headers = validate_headers;
            let mut alloc = FreeListAllocator::new(&config).unwrap();

            let a = alloc.alloc(200).unwrap();
            let b = alloc.alloc(100).unwrap();
            alloc.free(a).unwrap();
            let free_before = blocks(&alloc);

            assert!(matches!(alloc.free(a), Err(AllocError::DoubleFree { .. })));
            assert!(matches!(alloc.realloc(a, 50), Err(AllocError::InvalidHandle { .. })));
            assert_eq!(blocks(&alloc), free_before);

            alloc.free(b).unwrap();
            assert!(matches!(alloc.free(b), Err(AllocError::DoubleFree { .. })));
            assert_eq!(blocks(&alloc), vec![(0, 1024)]);
        }
    }

    #[test]
    fn test_forged_header_without_validation() {
        let mut config = FreeListConfig::new("test", 1024);
        config.validate_headers = false;
        let mut alloc = FreeListAllocator::new(&config).unwrap();

        let a = alloc.alloc(200).unwrap();
        let forged = Handle::from_raw(0, a.offset() + 96);
        let fake = AllocationHeader {
            start: a.offset(),
            size: 8,
            alignment: 1,
            self_offset: usize::MAX,
        };
        alloc.bytes_mut(a).unwrap()[64..96].copy_from_slice(bytemuck::bytes_of(&fake));

        // The span comes from the handle, so the bogus self-offset is harmless.
        let moved = alloc.realloc(forged, 500).unwrap();
        assert_eq!(alloc.header(moved).unwrap().size, 500);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_rejects_span_over_free_block() {
        let mut config = FreeListConfig::new("test", 1024);
        config.validate_headers = false;
        let mut alloc = FreeListAllocator::new(&config).unwrap();

        let a = alloc.alloc(100).unwrap();
        let b = alloc.alloc(100).unwrap();
        alloc.free(a).unwrap();

        // Claims to start inside the freed block in front of it.
        let fake = AllocationHeader {
            start: 0,
            size: 8,
            alignment: 1,
            self_offset: b.offset() + 32,
        };
        alloc.bytes_mut(b).unwrap()[..32].copy_from_slice(bytemuck::bytes_of(&fake));
        let forged = Handle::from_raw(0, b.offset() + 32);
        let free_before = blocks(&alloc);

        assert!(matches!(
            alloc.realloc(forged, 500),
            Err(AllocError::InvalidHandle { .. })
        ));
        assert_eq!(blocks(&alloc), free_before);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_read_from_byte_aligned_allocation() {
        let mut alloc = allocator(1024);
        alloc.alloc(3).unwrap();
        let handle = alloc.aligned_alloc(8, 1).unwrap();

        let value = 0x0102_0304_0506_0708u64;
        alloc.bytes_mut(handle).unwrap().copy_from_slice(&value.to_ne_bytes());
        assert_eq!(alloc.read::<u64>(handle).unwrap(), value);
    }

    #[test]
    fn test_realloc_same_size_is_noop() {
        let mut alloc = allocator(1024);
        let handle = alloc.alloc(100).unwrap();
        let before = blocks(&alloc);
        assert_eq!(alloc.realloc(handle, 100).unwrap(), handle);
        assert_eq!(blocks(&alloc), before);
    }

    #[test]
    fn test_realloc_zero_size() {
        let mut alloc = allocator(1024);
        let handle = alloc.alloc(100).unwrap();
        assert!(matches!(alloc.realloc(handle, 0), Err(AllocError::ZeroSize { .. })));
    }

    #[test]
    fn test_realloc_grow_in_place() {
        let mut alloc = allocator(1024);
        let handle = alloc.alloc(100).unwrap();
        fill(&mut alloc, handle);

        let grown = alloc.realloc(handle, 300).unwrap();
        assert_eq!(grown, handle);
        assert_eq!(alloc.header(grown).unwrap().size, 300);
        assert_filled(&alloc, grown, 100);
        assert_eq!(blocks(&alloc), vec![(HEADER_SIZE + 300, 1024 - HEADER_SIZE - 300)]);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_grow_absorbs_small_remainder() {
        let mut alloc = allocator(1024);
        let a = alloc.alloc(100).unwrap();
        let gap = alloc.alloc(100).unwrap();
        let _b = alloc.alloc(100).unwrap();

        let gap_span = alloc.header(gap).unwrap().span();
        alloc.free(gap).unwrap();

        // Leaves less than a header of the freed gap, so all of it is taken.
        let grown = alloc.realloc(a, 100 + gap_span - 10).unwrap();
        assert_eq!(grown, a);
        assert_eq!(alloc.header(a).unwrap().size, 100 + gap_span);
        assert_eq!(alloc.free_blocks().count(), 1);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_shrink_into_following_block() {
        let mut alloc = allocator(1024);
        let handle = alloc.alloc(200).unwrap();
        fill(&mut alloc, handle);

        let shrunk = alloc.realloc(handle, 100).unwrap();
        assert_eq!(shrunk, handle);
        assert_eq!(alloc.header(handle).unwrap().size, 100);
        assert_eq!(blocks(&alloc), vec![(HEADER_SIZE + 100, 1024 - HEADER_SIZE - 100)]);
        assert_filled(&alloc, handle, 100);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_shrink_carves_block() {
        let mut alloc = allocator(1024);
        let a = alloc.alloc(200).unwrap();
        let _b = alloc.alloc(100).unwrap();

        alloc.realloc(a, 100).unwrap();
        let free = blocks(&alloc);
        assert_eq!(free.len(), 2);
        assert_eq!(free[0], (a.offset() + 100, 100));
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_shrink_keeps_slack() {
        let mut alloc = allocator(1024);
        let a = alloc.alloc(200).unwrap();
        let _b = alloc.alloc(100).unwrap();
        let used = alloc.used_size();

        // 10 bytes cannot hold a free block; the reported size stays put.
        assert_eq!(alloc.realloc(a, 190).unwrap(), a);
        assert_eq!(alloc.header(a).unwrap().size, 200);
        assert_eq!(alloc.used_size(), used);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_relocates_over_previous_block() {
        let mut alloc = allocator(1024);
        let x = alloc.alloc(100).unwrap();
        let y = alloc.alloc(100).unwrap();
        let _z = alloc.alloc(600).unwrap();
        fill(&mut alloc, y);
        alloc.free(x).unwrap();

        // Only the merged x+y region can hold 200 bytes, and it overlaps y.
        let moved = alloc.realloc(y, 200).unwrap();
        assert_eq!(moved, x);
        assert_eq!(alloc.header(moved).unwrap().size, 200);
        assert_filled(&alloc, moved, 100);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_relocates_forward() {
        let mut alloc = allocator(1024);
        let a = alloc.alloc(100).unwrap();
        let _b = alloc.alloc(100).unwrap();
        fill(&mut alloc, a);

        let moved = alloc.realloc(a, 300).unwrap();
        assert!(moved.offset() > a.offset());
        assert_filled(&alloc, moved, 100);

        // The old span went back to the free list.
        assert_eq!(blocks(&alloc)[0].0, 0);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_realloc_failure_rolls_back() {
        let mut alloc = allocator(1024);
        let a = alloc.alloc(100).unwrap();
        let b = alloc.alloc(100).unwrap();
        let _c = alloc.alloc(100).unwrap();
        let d = alloc.alloc(100).unwrap();
        let _e = alloc.alloc(400).unwrap();
        assert_eq!(alloc.free_blocks().count(), 0);

        alloc.free(b).unwrap();
        alloc.free(d).unwrap();
        fill(&mut alloc, a);

        let free_before = blocks(&alloc);
        let used_before = alloc.used_size();
        let header_before = alloc.header(a).unwrap();

        // Passes the fast reject, grows past the next block, fits nowhere.
        let result = alloc.realloc(a, 250);
        assert!(matches!(result, Err(AllocError::OutOfMemory { requested: 250, .. })));

        assert_eq!(blocks(&alloc), free_before);
        assert_eq!(alloc.used_size(), used_before);
        assert_eq!(alloc.header(a).unwrap(), header_before);
        assert_filled(&alloc, a, 100);
    }

    #[test]
    fn test_realloc_fast_reject() {
        let mut alloc = allocator(1024);
        let a = alloc.alloc(100).unwrap();
        let free_before = blocks(&alloc);

        let too_big = 100 + alloc.free_size() + 1;
        assert!(matches!(alloc.realloc(a, too_big), Err(AllocError::OutOfMemory { .. })));
        assert_eq!(blocks(&alloc), free_before);
        assert_eq!(alloc.header(a).unwrap().size, 100);
    }

    #[test]
    fn test_construct_and_read() {
        let mut alloc = allocator(1024);
        let handle = alloc.construct([1.5f32, -2.0, 3.25]).unwrap();
        assert_eq!(alloc.read::<[f32; 3]>(handle).unwrap(), [1.5, -2.0, 3.25]);
        assert!(alloc.read::<[u8; 64]>(handle).is_err());
    }

    #[test]
    fn test_alloc_zero_clears_reused_memory() {
        let mut alloc = allocator(1024);
        let dirty = alloc.alloc(64).unwrap();
        alloc.bytes_mut(dirty).unwrap().fill(0xAB);
        alloc.free(dirty).unwrap();

        let clean = alloc.alloc_zero(64).unwrap();
        assert_eq!(clean, dirty);
        assert!(alloc.bytes(clean).unwrap().iter().all(|&b| b == 0));
    }
}
