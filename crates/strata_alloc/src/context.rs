//! # Process-Wide Allocators
//!
//! The two default allocators every subsystem is handed at construction:
//!
//! - **persistent**: a linear allocator for data that lives until shutdown
//! - **general**: a free-list allocator for arbitrary alloc/free traffic
//!
//! Both are created once by the entry point with [`Allocators::init`] and torn
//! down once with [`Allocators::shutdown`]. Nothing here is global; callers
//! pass `&mut dyn Allocator` to whoever needs memory.

use crate::allocator::Allocator;
use crate::config::MemoryConfig;
use crate::error::AllocResult;
use crate::free_list::FreeListAllocator;
use crate::linear::LinearAllocator;

/// Size of the persistent allocator's inline page.
pub const PERSISTENT_INLINE_PAGE_SIZE: usize = 16 * 1024;

/// The persistent linear allocator type.
pub type PersistentAllocator = LinearAllocator<PERSISTENT_INLINE_PAGE_SIZE>;

/// Owner of the process-wide allocators.
pub struct Allocators {
    persistent: Box<PersistentAllocator>,
    general: FreeListAllocator,
}

impl Allocators {
    /// Validates `config` and creates both allocators.
    ///
    /// # Errors
    ///
    /// Configuration errors, or the general allocator's backing buffer could
    /// not be reserved.
    pub fn init(config: &MemoryConfig) -> AllocResult<Self> {
        config.validate()?;

        let persistent = Box::new(PersistentAllocator::new(&config.persistent)?);
        let general = FreeListAllocator::new(&config.general)?;

        tracing::debug!(
            persistent = %config.persistent.name,
            general = %config.general.name,
            general_size = config.general.total_size,
            "allocators initialized"
        );
        Ok(Self {
            persistent,
            general,
        })
    }

    /// The persistent linear allocator.
    #[inline]
    pub fn persistent(&mut self) -> &mut PersistentAllocator {
        &mut self.persistent
    }

    /// The general free-list allocator.
    #[inline]
    pub fn general(&mut self) -> &mut FreeListAllocator {
        &mut self.general
    }

    /// Both allocators at once, as trait objects.
    pub fn split(&mut self) -> (&mut dyn Allocator, &mut dyn Allocator) {
        let persistent: &mut dyn Allocator = &mut *self.persistent;
        let general: &mut dyn Allocator = &mut self.general;
        (persistent, general)
    }

    /// Tears both allocators down.
    pub fn shutdown(self) {
        tracing::debug!(
            general_in_use = self.general.used_size(),
            persistent_pages = self.persistent.page_count(),
            "allocators shutting down"
        );
    }
}
