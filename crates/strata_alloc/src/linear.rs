//! # Linear Allocator
//!
//! A paged bump allocator for scratch and startup allocations.
//!
//! ```text
//!   page 0 (inline)            page 1 (heap)              page 2 (heap)
//!   ┌────┬────┬────┬──────┐    ┌────┬────┬───────────┐    ┌──────────────┐
//!   │ A1 │ A2 │ A3 │ dead │ →  │ A4 │ A5 │           │ →  │ (spare)      │
//!   └────┴────┴────┴──────┘    └────┴────┴───────────┘    └──────────────┘
//!                                        ▲
//!                                  current page, top
//! ```
//!
//! The first page is stored inline, sized by a const parameter. Heap pages
//! are added on demand, sized `max(page_size, request + header + slack)`, and
//! kept until the allocator is dropped. Only the most recent allocation can
//! be resized or freed; anything else is rejected with
//! [`AllocError::NotTopOfStack`].
//!
//! # Thread Safety
//!
//! This allocator is NOT thread-safe. Use one allocator per thread.

use std::ops::Range;

use crate::allocator::{Allocator, Handle};
use crate::config::LinearConfig;
use crate::error::{AllocError, AllocResult};
use crate::header::{self, AllocationHeader, HEADER_SIZE};

/// Default size of the inline first page.
pub const DEFAULT_INLINE_PAGE_SIZE: usize = 4096;

/// The mutable cursor of a linear allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LinearState {
    current_page: usize,
    top: usize,
}

impl LinearState {
    /// Index of the page allocations are bumped from.
    #[inline]
    #[must_use]
    pub const fn current_page(self) -> usize {
        self.current_page
    }

    /// Next free byte in the current page.
    #[inline]
    #[must_use]
    pub const fn top(self) -> usize {
        self.top
    }
}

/// Paged bump allocator with stack-discipline `realloc`/`free`.
///
/// # Example
///
/// ```rust
/// use strata_alloc::{Allocator, LinearAllocator, LinearConfig};
///
/// let mut arena: LinearAllocator<1024> =
///     LinearAllocator::new(&LinearConfig::new("scratch", 4096)).unwrap();
///
/// let before = arena.state();
/// let handle = arena.alloc(64).unwrap();
/// arena.free(handle).unwrap();
/// assert_eq!(arena.state(), before);
/// ```
pub struct LinearAllocator<const INLINE: usize = DEFAULT_INLINE_PAGE_SIZE> {
    /// Name used in log lines and errors.
    name: String,
    /// Page 0.
    first_page: [u8; INLINE],
    /// Pages 1.., in link order.
    heap_pages: Vec<Box<[u8]>>,
    /// Allocation cursor.
    state: LinearState,
    /// Minimum heap page size.
    page_size: usize,
    /// Cap on heap pages.
    max_pages: Option<usize>,
    /// Check header self-offsets on `free`/`realloc`.
    validate_headers: bool,
}

impl<const INLINE: usize> LinearAllocator<INLINE> {
    /// Creates an allocator with only its inline page.
    ///
    /// # Errors
    ///
    /// [`AllocError::ZeroSize`] if `page_size` is zero.
    pub fn new(config: &LinearConfig) -> AllocResult<Self> {
        if config.page_size == 0 {
            return Err(AllocError::ZeroSize {
                allocator: config.name.clone(),
            }
            .logged());
        }

        tracing::debug!(
            allocator = %config.name,
            inline_page = INLINE,
            page_size = config.page_size,
            "linear allocator initialized"
        );

        Ok(Self {
            name: config.name.clone(),
            first_page: [0; INLINE],
            heap_pages: Vec::new(),
            state: LinearState::default(),
            page_size: config.page_size,
            max_pages: config.max_pages,
            validate_headers: config.validate_headers,
        })
    }

    /// Current allocation cursor.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> LinearState {
        self.state
    }

    /// Number of pages, the inline one included.
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        1 + self.heap_pages.len()
    }

    /// Total bytes across all pages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        INLINE + self.heap_pages.iter().map(|p| p.len()).sum::<usize>()
    }

    /// Rewinds to the start of the inline page, keeping heap pages for reuse.
    ///
    /// Every handle issued so far becomes invalid.
    pub fn reset(&mut self) {
        self.restore(LinearState::default());
    }

    /// Releases every heap page.
    pub fn destroy(self) {
        drop(self);
    }

    /// Overwrites the cursor with an earlier snapshot.
    pub(crate) fn restore(&mut self, state: LinearState) {
        tracing::debug!(
            allocator = %self.name,
            page = state.current_page,
            top = state.top,
            "linear allocator rewound"
        );
        self.state = state;
    }

    fn page(&self, index: usize) -> Option<&[u8]> {
        if index == 0 {
            Some(&self.first_page[..])
        } else {
            self.heap_pages.get(index - 1).map(|p| &**p)
        }
    }

    /// Only called with indices of existing pages.
    fn page_mut(&mut self, index: usize) -> &mut [u8] {
        if index == 0 {
            &mut self.first_page[..]
        } else {
            &mut self.heap_pages[index - 1][..]
        }
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

    fn live_header(&self, handle: Handle) -> AllocResult<AllocationHeader> {
        let LinearState { current_page, top } = self.state;
        if handle.page() > current_page {
            return Err(self.invalid_handle(handle));
        }
        let header = self
            .page(handle.page())
            .and_then(|page| header::read_header(page, handle.offset(), self.validate_headers))
            .ok_or_else(|| self.invalid_handle(handle))?;
        if handle.page() == current_page && handle.offset() + header.size > top {
            return Err(self.invalid_handle(handle));
        }
        Ok(header)
    }

    fn top_header(&self, handle: Handle) -> AllocResult<AllocationHeader> {
        let header = self.live_header(handle)?;
        if handle.page() != self.state.current_page
            || handle.offset() + header.size != self.state.top
        {
            return Err(AllocError::NotTopOfStack {
                allocator: self.name.clone(),
                handle,
            }
            .logged());
        }
        Ok(header)
    }

    /// Bumps `top` within the current page, or returns `None` if it does not fit.
    fn bump(&mut self, size: usize, alignment: usize) -> Option<Handle> {
        let LinearState { current_page, top } = self.state;
        let offset = top
            .checked_add(HEADER_SIZE)
            .and_then(|first| header::align_up(first, alignment))?;
        let end = offset.checked_add(size)?;

        let page = self.page_mut(current_page);
        if end > page.len() {
            return None;
        }
        let header = AllocationHeader {
            start: top,
            size,
            alignment,
            self_offset: offset,
        };
        header::write_header(page, offset, &header);
        self.state.top = end;
        Some(Handle::from_raw(current_page, offset))
    }

    /// Makes the page after the current one current, creating it if needed.
    fn advance_page(&mut self, size: usize, alignment: usize) -> AllocResult<()> {
        let required = size
            .checked_add(HEADER_SIZE + alignment - 1)
            .ok_or_else(|| self.out_of_memory(size))?;
        let next = self.state.current_page + 1;

        let reusable = self.page(next).is_some_and(|page| page.len() >= required);
        if !reusable {
            if self
                .max_pages
                .is_some_and(|max| self.heap_pages.len() >= max)
            {
                return Err(self.out_of_memory(size));
            }

            let page_size = self.page_size.max(required);
            let mut storage = Vec::new();
            storage.try_reserve_exact(page_size).map_err(|_| {
                AllocError::SystemAllocation {
                    allocator: self.name.clone(),
                    size: page_size,
                }
                .logged()
            })?;
            storage.resize(page_size, 0);
            self.heap_pages.insert(next - 1, storage.into_boxed_slice());

            tracing::debug!(allocator = %self.name, page = next, page_size, "new page");
        }

        self.state = LinearState {
            current_page: next,
            top: 0,
        };
        Ok(())
    }

    /// Copies `range` of page `src` into page `dst` at `dst_offset`. `src < dst`.
    fn copy_forward(&mut self, src: usize, range: Range<usize>, dst: usize, dst_offset: usize) {
        let dst_range = dst_offset..dst_offset + range.len();
        if src == 0 {
            self.heap_pages[dst - 1][dst_range].copy_from_slice(&self.first_page[range]);
        } else {
            let (lower, upper) = self.heap_pages.split_at_mut(dst - 1);
            upper[0][dst_range].copy_from_slice(&lower[src - 1][range]);
        }
    }
}

impl<const INLINE: usize> Allocator for LinearAllocator<INLINE> {
    fn name(&self) -> &str {
        &self.name
    }

    fn aligned_alloc(&mut self, size: usize, alignment: usize) -> AllocResult<Handle> {
        header::check_request(&self.name, size, alignment)?;

        if let Some(handle) = self.bump(size, alignment) {
            tracing::trace!(allocator = %self.name, ?handle, size, "alloc");
            return Ok(handle);
        }

        self.advance_page(size, alignment)?;
        let handle = self
            .bump(size, alignment)
            .ok_or_else(|| self.out_of_memory(size))?;
        tracing::trace!(allocator = %self.name, ?handle, size, "alloc");
        Ok(handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> AllocResult<Handle> {
        let mut header = self.top_header(handle)?;
        if new_size == 0 {
            return Err(AllocError::ZeroSize {
                allocator: self.name.clone(),
            }
            .logged());
        }
        if new_size == header.size {
            return Ok(handle);
        }

        let offset = handle.offset();
        let page_len = self.page(handle.page()).map_or(0, <[u8]>::len);
        if let Some(end) = offset.checked_add(new_size).filter(|&end| end <= page_len) {
            header.size = new_size;
            header::write_header(self.page_mut(handle.page()), offset, &header);
            self.state.top = end;
            return Ok(handle);
        }

        // Does not fit the current page: free the top, then allocate afresh.
        let saved = self.state;
        self.state.top = header.start;
        let moved = match self.aligned_alloc(new_size, header.alignment) {
            Ok(moved) => moved,
            Err(err) => {
                self.state = saved;
                return Err(err);
            }
        };

        self.copy_forward(
            handle.page(),
            offset..offset + header.size,
            moved.page(),
            moved.offset(),
        );
        header::clear_header(self.page_mut(handle.page()), offset);
        Ok(moved)
    }

    fn free(&mut self, handle: Handle) -> AllocResult<()> {
        let header = self.top_header(handle)?;
        header::clear_header(self.page_mut(handle.page()), handle.offset());
        self.state.top = header.start;
        tracing::trace!(allocator = %self.name, ?handle, "free");
        Ok(())
    }

    fn header(&self, handle: Handle) -> AllocResult<AllocationHeader> {
        self.live_header(handle)
    }

    fn bytes(&self, handle: Handle) -> AllocResult<&[u8]> {
        let header = self.live_header(handle)?;
        let offset = handle.offset();
        self.page(handle.page())
            .map(|page| &page[offset..offset + header.size])
            .ok_or_else(|| self.invalid_handle(handle))
    }

    fn bytes_mut(&mut self, handle: Handle) -> AllocResult<&mut [u8]> {
        let header = self.live_header(handle)?;
        let offset = handle.offset();
        Ok(&mut self.page_mut(handle.page())[offset..offset + header.size])
    }
}

impl<const INLINE: usize> Drop for LinearAllocator<INLINE> {
    fn drop(&mut self) {
        tracing::debug!(
            allocator = %self.name,
            heap_pages = self.heap_pages.len(),
            "linear allocator destroyed"
        );
    }
}
