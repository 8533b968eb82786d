//! # STRATA Allocator Family
//!
//! The memory allocators the rest of the engine (containers, GPU resource
//! layers, loaders) is built on.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │    Allocator (trait)    │
//!                     │ aligned_alloc / realloc │
//!                     │ free / construct<T>     │
//!                     └────────────┬────────────┘
//!            ┌─────────────────────┼──────────────────────┐
//!            ▼                     ▼                      ▼
//!   ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//!   │ FreeListAllocator│  │ LinearAllocator  │◄─│ ScopeAllocator   │
//!   │ best-fit, merge  │  │ paged bump arena │  │ snapshot/restore │
//!   └──────────────────┘  └──────────────────┘  └──────────────────┘
//! ```
//!
//! Every allocation carries an [`AllocationHeader`] in the bytes right before
//! it, and is named by a [`Handle`] instead of a raw pointer.
//!
//! ## Rules
//!
//! 1. **No unsafe code** - memory is reached through handles and slices
//! 2. **Every failure is logged and returned** - nothing panics on bad input
//! 3. **Single-threaded** - one owner per allocator instance
//!
//! ## Example
//!
//! ```rust
//! use strata_alloc::{Allocator, Allocators, MemoryConfig, FreeListConfig};
//!
//! let config = MemoryConfig {
//!     general: FreeListConfig::new("general", 64 * 1024),
//!     ..MemoryConfig::default()
//! };
//! let mut allocators = Allocators::init(&config).unwrap();
//!
//! let general = allocators.general();
//! let handle = general.construct(42u64).unwrap();
//! assert_eq!(general.read::<u64>(handle).unwrap(), 42);
//! general.free(handle).unwrap();
//!
//! allocators.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod allocator;
pub mod config;
pub mod context;
pub mod error;
pub mod free_list;
pub mod header;
pub mod linear;
pub mod scope;

pub use allocator::{Allocator, Handle, DEFAULT_ALIGNMENT};
pub use config::{FreeListConfig, LinearConfig, MemoryConfig};
pub use context::{Allocators, PersistentAllocator};
pub use error::{AllocError, AllocResult};
pub use free_list::{FreeBlock, FreeListAllocator};
pub use header::{AllocationHeader, HEADER_SIZE};
pub use linear::{LinearAllocator, LinearState, DEFAULT_INLINE_PAGE_SIZE};
pub use scope::ScopeAllocator;
