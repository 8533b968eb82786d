//! # Allocator Error Types
//!
//! All errors that can occur in the allocator family.
//!
//! Errors are logged once, where they are raised, and then handed back to the
//! caller. The allocators never retry or fall back on their own.

use thiserror::Error;

use crate::allocator::Handle;

/// Errors that can occur in the allocator family.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// A zero-byte request, or a zero-sized backing store.
    #[error("zero-sized request to allocator {allocator}")]
    ZeroSize {
        /// Name of the allocator.
        allocator: String,
    },

    /// Alignment was zero or not a power of two.
    #[error("invalid alignment {alignment} for allocator {allocator}: must be a power of two")]
    InvalidAlignment {
        /// Name of the allocator.
        allocator: String,
        /// The rejected alignment.
        alignment: usize,
    },

    /// No space left to satisfy the request.
    #[error("out of space for allocator {allocator}: requested {requested} bytes")]
    OutOfMemory {
        /// Name of the allocator.
        allocator: String,
        /// Requested size in bytes.
        requested: usize,
    },

    /// The system allocator refused to back a buffer or page.
    #[error("allocator {allocator} could not reserve {size} bytes from the system")]
    SystemAllocation {
        /// Name of the allocator.
        allocator: String,
        /// Size of the refused reservation.
        size: usize,
    },

    /// The handle does not describe a live allocation of this allocator.
    #[error("invalid handle {handle:?} passed to allocator {allocator}")]
    InvalidHandle {
        /// Name of the allocator.
        allocator: String,
        /// The rejected handle.
        handle: Handle,
    },

    /// The handle's span is already tracked as free.
    #[error("double free of {handle:?} in allocator {allocator}")]
    DoubleFree {
        /// Name of the allocator.
        allocator: String,
        /// The handle freed twice.
        handle: Handle,
    },

    /// Linear allocators only resize or free their most recent allocation.
    #[error("{handle:?} is not the top-of-stack allocation of allocator {allocator}")]
    NotTopOfStack {
        /// Name of the allocator.
        allocator: String,
        /// The rejected handle.
        handle: Handle,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AllocError {
    /// Emits the error through `tracing` and returns it unchanged.
    #[must_use]
    pub(crate) fn logged(self) -> Self {
        tracing::error!(error = %self, "allocator failure");
        self
    }
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;
