//! The heap-growth collaborator.
//!
//! The allocator never owns memory itself; it asks a [`HeapGrower`] to move
//! the end of the managed region forward, the way `sbrk(2)` moves the
//! program break. [`RegionGrower`] implements that interface over a fixed
//! caller-provided region, which is how tests and bare-metal users feed the
//! allocator.

use core::ptr::NonNull;

use crate::error::GrowError;

/// Source of fresh heap memory.
///
/// # Safety
///
/// Implementors must guarantee that every successful `grow(n)` returns the
/// start of `n` bytes that are valid for reads and writes, not used by
/// anything else, and stay valid for as long as the grower exists. The region
/// returned by one call must begin where the region of the previous call
/// ended; the allocator rejects a grower that breaks this rule.
pub unsafe trait HeapGrower {
    /// Extends the region by `increment` bytes and returns its previous end.
    fn grow(&mut self, increment: usize) -> Result<NonNull<u8>, GrowError>;
}

/// A bounded break pointer over a fixed memory region.
#[derive(Debug)]
pub struct RegionGrower {
    start: NonNull<u8>,
    capacity: usize,
    brk: usize,
}

unsafe impl Send for RegionGrower {}

impl RegionGrower {
    /// Creates a grower that hands out `start..start + capacity` front to
    /// back.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `start..start + capacity` is valid for reads and writes
    /// - the region is not used by anything else while the grower, or an
    ///   allocator built on it, is alive
    #[must_use]
    pub const unsafe fn new(start: NonNull<u8>, capacity: usize) -> Self {
        Self {
            start,
            capacity,
            brk: 0,
        }
    }

    /// Bytes handed out so far.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.brk
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity - self.brk
    }
}

unsafe impl HeapGrower for RegionGrower {
    fn grow(&mut self, increment: usize) -> Result<NonNull<u8>, GrowError> {
        let available = self.remaining();
        if increment > available {
            return Err(GrowError::exhausted(increment, available));
        }
        let old_brk = unsafe { self.start.add(self.brk) };
        self.brk += increment;
        Ok(old_brk)
    }
}
