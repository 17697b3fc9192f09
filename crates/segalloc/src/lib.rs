//! Segregated-fit memory allocator with boundary-tag coalescing.
//!
//! The allocator manages a single contiguous heap that only ever grows at its
//! end, the way a process heap grows through `sbrk(2)`. Memory is obtained
//! from a [`HeapGrower`]; [`RegionGrower`] hands out a fixed region front to
//! back and is enough for bare-metal use and for tests.
//!
//! # Design
//!
//! - Every block carries a header and a footer word holding its size and
//!   allocation state, so both neighbours of a block are found in O(1).
//! - Free blocks are kept on [`CLASS_COUNT`] segregated lists by size class.
//!   Allocation is first-fit, starting at the class of the request.
//! - Freed blocks are merged with free neighbours immediately; two free
//!   blocks are never adjacent.
//! - When no free block fits, the heap is extended by at least
//!   [`AllocatorConfig::chunk_size`] bytes.
//!
//! All payloads are aligned to [`ALIGNMENT`] (twice the word size).
//!
//! # Usage
//!
//! ```rust
//! use std::{alloc::Layout, ptr::NonNull};
//!
//! use segalloc::{ALIGNMENT, AllocatorConfig, RegionGrower, SegregatedAllocator};
//!
//! // In a kernel this would be the memory reserved for the heap.
//! let layout = Layout::from_size_align(1 << 16, ALIGNMENT).unwrap();
//! let region = NonNull::new(unsafe { std::alloc::alloc(layout) }).unwrap();
//!
//! let grower = unsafe { RegionGrower::new(region, layout.size()) };
//! let mut allocator = SegregatedAllocator::init(grower, AllocatorConfig::new()).unwrap();
//!
//! let ptr = allocator.alloc(100).unwrap();
//! assert_eq!(ptr.addr().get() % ALIGNMENT, 0);
//! let ptr = unsafe { allocator.realloc(Some(ptr), 1000) }.unwrap();
//! unsafe { allocator.free(Some(ptr)) };
//!
//! assert!(allocator.check_heap(false).is_consistent());
//!
//! drop(allocator);
//! unsafe { std::alloc::dealloc(region.as_ptr(), layout) };
//! ```
//!
//! # Global allocator
//!
//! [`LockedAllocator`] serializes access with a spin lock and implements
//! [`GlobalAlloc`](core::alloc::GlobalAlloc). It never logs while the lock is
//! held, so the installed logger may itself allocate:
//!
//! ```rust,ignore
//! use segalloc::{AllocatorConfig, LockedAllocator, RegionGrower};
//!
//! #[global_allocator]
//! static ALLOCATOR: LockedAllocator<RegionGrower> = LockedAllocator::new(
//!     unsafe { RegionGrower::new(HEAP_START, HEAP_SIZE) },
//!     AllocatorConfig::new(),
//! );
//! ```
//!
//! # Thread Safety
//!
//! [`SegregatedAllocator`] is `Send` but not `Sync`; every operation takes
//! `&mut self`. Wrap it in a lock, such as [`LockedAllocator`], to share it.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod allocator;
mod block;
mod check;
mod config;
mod error;
mod free_list;
mod grow;
mod locked;
#[cfg(test)]
mod testing;

pub use self::{
    allocator::SegregatedAllocator,
    block::{ALIGNMENT, BlockPtr, MIN_BLOCK_SIZE, Tag, WORD_SIZE},
    check::{HeapReport, HeapViolation, MAX_REPORTED_VIOLATIONS},
    config::AllocatorConfig,
    error::{GrowError, HeapError},
    free_list::{CLASS_COUNT, SizeClass},
    grow::{HeapGrower, RegionGrower},
    locked::LockedAllocator,
};
