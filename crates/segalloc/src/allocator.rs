//! The allocator core: `init`, `alloc`, `free` and `realloc`.
//!
//! # Algorithm
//!
//! - **Allocation**: the request is normalized by the [`AllocatorConfig`]
//!   policy into a block size, the free-list index is searched first-fit
//!   from the matching class upward, and the chosen block is split when the
//!   remainder can stand on its own. When nothing fits, the heap is
//!   extended by at least one chunk.
//! - **Deallocation**: the block is marked free and immediately coalesced
//!   with free neighbours found through the boundary tags.
//! - **Reallocation**: served in place when the block is already big enough
//!   or can absorb a free right neighbour, otherwise by allocate, copy and
//!   free.
//!
//! # Heap layout
//!
//! ```text
//!  base
//!  ┌─────┬──────────┬──────────┬─────────────────────────┬──────────┐
//!  │ pad │ prologue │ prologue │ blocks ...              │ epilogue │
//!  │     │ header   │ footer   │                         │ header   │
//!  └─────┴──────────┴──────────┴─────────────────────────┴──────────┘
//! ```
//!
//! The prologue and epilogue are permanently allocated, so coalescing never
//! needs to special-case the ends of the heap.

use core::ptr::NonNull;

use snafu::{OptionExt as _, ResultExt as _, ensure};

use crate::{
    block::{
        ALIGNMENT, BlockPtr, HeapMemory, INITIAL_HEAP_SIZE, MIN_BLOCK_SIZE, PROLOGUE, Tag,
        WORD_SIZE,
    },
    check::{self, HeapReport},
    config::AllocatorConfig,
    error::{GrowSnafu, HeapError, MisalignedBaseSnafu, NonContiguousSnafu, SizeOverflowSnafu},
    free_list::FreeLists,
    grow::HeapGrower,
};

/// Segregated-fit allocator with boundary-tag coalescing.
///
/// Owns the allocator context (heap view, free-list sentinels, policy) and
/// the [`HeapGrower`] that supplies memory. All operations take `&mut self`;
/// wrap the allocator in a lock such as [`LockedAllocator`] to share it.
///
/// [`LockedAllocator`]: crate::LockedAllocator
pub struct SegregatedAllocator<G> {
    grower: G,
    config: AllocatorConfig,
    heap: HeapMemory,
    free_lists: FreeLists,
}

unsafe impl<G> Send for SegregatedAllocator<G> where G: Send {}

impl<G> SegregatedAllocator<G>
where
    G: HeapGrower,
{
    /// Builds the initial heap: prologue, epilogue and one free chunk.
    ///
    /// The allocator only exists once initialization succeeded, so there is
    /// no way to allocate from an uninitialized heap.
    pub fn init(mut grower: G, config: AllocatorConfig) -> Result<Self, HeapError> {
        config.validate()?;

        let base = grower.grow(INITIAL_HEAP_SIZE).context(GrowSnafu {
            size: INITIAL_HEAP_SIZE,
        })?;
        let address = base.addr().get();
        ensure!(
            address.is_multiple_of(ALIGNMENT),
            MisalignedBaseSnafu { address }
        );

        let heap = unsafe { HeapMemory::new(base, INITIAL_HEAP_SIZE) };
        let mut this = Self {
            grower,
            config,
            heap,
            free_lists: FreeLists::new(),
        };
        this.heap.write_word(0, 0);
        this.heap.set_tags(PROLOGUE, Tag::allocated(ALIGNMENT));
        let epilogue = this.heap.next_block(PROLOGUE);
        this.heap.set_header(epilogue, Tag::EPILOGUE);

        this.extend_heap(config.chunk_size() / WORD_SIZE)?;
        Ok(this)
    }

    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    #[must_use]
    pub fn grower(&self) -> &G {
        &self.grower
    }

    /// Number of bytes currently under management, sentinels included.
    #[must_use]
    pub fn heap_size(&self) -> usize {
        self.heap.len()
    }

    /// Allocates a block with at least `size` bytes of payload.
    ///
    /// Returns `None` for a zero-sized request (without touching the heap)
    /// and when the heap cannot be extended; the latter is logged at warn
    /// level. The returned pointer is aligned to [`ALIGNMENT`].
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        match self.try_alloc(size) {
            Ok(ptr) => {
                log::trace!("alloc({size}) -> {ptr:?}");
                ptr
            }
            Err(err) => {
                log::warn!("alloc({size}) failed: {err}");
                None
            }
        }
    }

    /// Like [`alloc`](Self::alloc), but returns the heap extension error
    /// instead of logging it.
    ///
    /// Nothing on this path logs, so it may run under a lock that the
    /// installed logger itself depends on.
    pub fn try_alloc(&mut self, size: usize) -> Result<Option<NonNull<u8>>, HeapError> {
        let Some(asize) = self.config.block_size_for(size) else {
            return Ok(None);
        };

        let bp = match self.free_lists.find_fit(&self.heap, asize) {
            Some(bp) => bp,
            None => {
                let extend_size = usize::max(asize, self.config.chunk_size());
                self.extend_heap(extend_size / WORD_SIZE)?
            }
        };
        self.place(bp, asize);
        Ok(Some(self.heap.payload(bp)))
    }

    /// Releases a block returned by [`alloc`](Self::alloc) or
    /// [`realloc`](Self::realloc). `None` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` does not point into the payload area of this heap.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by this allocator and has not been freed since
    /// - the block is not accessed after this call
    pub unsafe fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            return;
        };
        let bp = self.heap.block_of(ptr);
        let tag = self.heap.header(bp);
        debug_assert!(tag.is_allocated(), "block {bp} freed twice");

        self.heap.set_tags(bp, Tag::free(tag.size()));
        self.coalesce(bp);
    }

    /// Resizes a block to hold at least `size` bytes.
    ///
    /// - `size == 0` frees `ptr` and returns `None`.
    /// - `ptr == None` behaves as [`alloc`](Self::alloc).
    /// - If the block is already big enough, or can absorb its free right
    ///   neighbour, the same pointer is returned; bytes past the old
    ///   capacity are unspecified.
    /// - Otherwise the contents are moved to a new block. If that allocation
    ///   fails, `None` is returned, the failure is logged at warn level and
    ///   the original block is left untouched.
    ///
    /// # Safety
    ///
    /// Same requirements as [`free`](Self::free) for a non-null `ptr`. On
    /// success the old pointer must no longer be used unless it is the one
    /// returned.
    pub unsafe fn realloc(&mut self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        match unsafe { self.try_realloc(ptr, size) } {
            Ok(new_ptr) => {
                log::trace!("realloc({ptr:?}, {size}) -> {new_ptr:?}");
                new_ptr
            }
            Err(err) => {
                log::warn!("realloc({ptr:?}, {size}) failed: {err}");
                None
            }
        }
    }

    /// Like [`realloc`](Self::realloc), but returns the heap extension error
    /// instead of logging it. On error the original block is untouched.
    ///
    /// # Safety
    ///
    /// Same as [`realloc`](Self::realloc).
    pub unsafe fn try_realloc(
        &mut self,
        ptr: Option<NonNull<u8>>,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, HeapError> {
        if size == 0 {
            unsafe { self.free(ptr) };
            return Ok(None);
        }
        let Some(ptr) = ptr else {
            return self.try_alloc(size);
        };

        let bp = self.heap.block_of(ptr);
        let current = self.heap.header(bp).size();
        let capacity = current - ALIGNMENT;
        if capacity >= size {
            return Ok(Some(ptr));
        }

        let next = self.heap.next_block(bp);
        let next_tag = self.heap.header(next);
        if !next_tag.is_allocated() {
            let combined = current + next_tag.size();
            if size <= combined - ALIGNMENT {
                self.free_lists.remove(&mut self.heap, next);
                self.heap.set_tags(bp, Tag::allocated(combined));
                return Ok(Some(ptr));
            }
        }

        let Some(new_ptr) = self.try_alloc(size)? else {
            return Ok(None);
        };
        let new_bp = self.heap.block_of(new_ptr);
        self.heap.copy_payload(bp, new_bp, usize::min(capacity, size));
        unsafe { self.free(Some(ptr)) };
        Ok(Some(new_ptr))
    }

    /// Payload capacity of a live allocation.
    ///
    /// This is at least the size last requested for `ptr` and may be larger.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this allocator.
    #[must_use]
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        let bp = self.heap.block_of(ptr);
        self.heap.header(bp).size() - ALIGNMENT
    }

    /// Walks the whole heap and every free list and reports inconsistencies.
    ///
    /// Violations are logged at error level and collected into the report;
    /// nothing is repaired and the heap is not modified. With `verbose`, every
    /// block is dumped at info level as well.
    pub fn check_heap(&self, verbose: bool) -> HeapReport {
        let report = check::check(&self.heap, &self.free_lists, verbose);
        report.log_violations();
        report
    }

    /// [`check_heap`](Self::check_heap) without any logging.
    pub(crate) fn check_heap_silently(&self) -> HeapReport {
        check::check(&self.heap, &self.free_lists, false)
    }

    /// Grows the heap by `words` (rounded up to an even count) and returns
    /// the free block covering the new space after coalescing.
    fn extend_heap(&mut self, words: usize) -> Result<BlockPtr, HeapError> {
        let size = words
            .checked_next_multiple_of(2)
            .and_then(|words| words.checked_mul(WORD_SIZE))
            .context(SizeOverflowSnafu { words })?;

        let expected = self.heap.end_addr();
        let start = self.grower.grow(size).context(GrowSnafu { size })?;
        let found = start.addr().get();
        ensure!(found == expected, NonContiguousSnafu { expected, found });
        unsafe { self.heap.extend(size) };

        // The old epilogue header becomes the header of the new block.
        let bp = BlockPtr::new(self.heap.len() - size);
        self.heap.set_tags(bp, Tag::free(size));
        let epilogue = self.heap.next_block(bp);
        self.heap.set_header(epilogue, Tag::EPILOGUE);

        Ok(self.coalesce(bp))
    }

    /// Allocates `asize` bytes at the start of the free block `bp`, splitting
    /// off the remainder when it is at least a minimum block.
    fn place(&mut self, bp: BlockPtr, asize: usize) {
        let csize = self.heap.header(bp).size();
        debug_assert!(csize >= asize);

        self.free_lists.remove(&mut self.heap, bp);
        if csize - asize >= MIN_BLOCK_SIZE {
            self.heap.set_tags(bp, Tag::allocated(asize));
            let rest = self.heap.next_block(bp);
            self.heap.set_tags(rest, Tag::free(csize - asize));
            self.free_lists.insert(&mut self.heap, rest);
        } else {
            self.heap.set_tags(bp, Tag::allocated(csize));
        }
    }

    /// Merges the free, unlisted block `bp` with its free neighbours and
    /// lists the result.
    fn coalesce(&mut self, bp: BlockPtr) -> BlockPtr {
        let prev_allocated = self.heap.prev_footer(bp).is_allocated();
        let next = self.heap.next_block(bp);
        let next_allocated = self.heap.header(next).is_allocated();
        let mut size = self.heap.header(bp).size();

        let merged = match (prev_allocated, next_allocated) {
            (true, true) => bp,
            (true, false) => {
                self.free_lists.remove(&mut self.heap, next);
                size += self.heap.header(next).size();
                bp
            }
            (false, true) => {
                let prev = self.heap.prev_block(bp);
                self.free_lists.remove(&mut self.heap, prev);
                size += self.heap.header(prev).size();
                prev
            }
            (false, false) => {
                let prev = self.heap.prev_block(bp);
                self.free_lists.remove(&mut self.heap, prev);
                self.free_lists.remove(&mut self.heap, next);
                size += self.heap.header(prev).size() + self.heap.header(next).size();
                prev
            }
        };

        self.heap.set_tags(merged, Tag::free(size));
        self.free_lists.insert(&mut self.heap, merged);
        merged
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        GrowError, RegionGrower,
        testing::{TestAllocator, with_test_allocator, with_test_heap},
    };

    /// Exact block sizes, so layouts in these tests are easy to predict.
    fn exact() -> AllocatorConfig {
        AllocatorConfig::new().with_small_request_rounding(false)
    }

    /// Payload bytes that produce a block of exactly `size` bytes.
    fn payload_for(size: usize) -> usize {
        size - ALIGNMENT
    }

    #[test]
    fn test_init_layout() {
        with_test_allocator(1 << 16, AllocatorConfig::new(), |allocator| {
            let chunk = AllocatorConfig::DEFAULT_CHUNK_SIZE;
            assert_eq!(allocator.inner.heap_size(), INITIAL_HEAP_SIZE + chunk);
            assert_eq!(allocator.inner.grower().used(), INITIAL_HEAP_SIZE + chunk);

            let report = allocator.assert_consistent();
            assert_eq!(report.blocks, 1);
            assert_eq!(report.free_blocks, 1);
            assert_eq!(report.free_bytes, chunk);
        });
    }

    #[test]
    fn test_init_fails_when_grower_is_too_small() {
        with_test_heap(INITIAL_HEAP_SIZE + 64, |start, size| {
            let grower = unsafe { RegionGrower::new(start, size) };
            let Err(err) = SegregatedAllocator::init(grower, AllocatorConfig::new()) else {
                panic!("init should fail");
            };
            assert!(matches!(err, HeapError::Grow { .. }));
        });
    }

    #[test]
    fn test_zero_sized_alloc_has_no_effect() {
        with_test_allocator(1 << 16, AllocatorConfig::new(), |allocator| {
            let before = allocator.inner.heap_size();
            assert!(allocator.alloc(0).is_none());
            assert_eq!(allocator.inner.heap_size(), before);
            assert_eq!(allocator.assert_consistent().free_blocks, 1);
        });
    }

    #[test]
    fn test_alloc_splits_front_of_free_block() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let a = allocator.alloc(payload_for(4 * ALIGNMENT)).unwrap();
            let b = allocator.alloc(payload_for(4 * ALIGNMENT)).unwrap();
            assert_eq!(b, a.add(4 * ALIGNMENT));
            assert_eq!(allocator.inner.usable_size(a), payload_for(4 * ALIGNMENT));

            let report = allocator.assert_consistent();
            assert_eq!(report.blocks, 3);
            assert_eq!(report.free_blocks, 1);

            allocator.free(a, payload_for(4 * ALIGNMENT));
            allocator.free(b, payload_for(4 * ALIGNMENT));
            assert_eq!(allocator.assert_consistent().blocks, 1);
        });
    }

    #[test]
    fn test_place_consumes_block_when_remainder_is_too_small() {
        let config = exact().with_chunk_size(4 * ALIGNMENT);
        with_test_allocator(1 << 12, config, |allocator| unsafe {
            let heap_size = allocator.inner.heap_size();
            // Leaves ALIGNMENT bytes, less than a minimum block.
            let a = allocator.alloc(payload_for(3 * ALIGNMENT)).unwrap();
            assert_eq!(allocator.inner.usable_size(a), payload_for(4 * ALIGNMENT));
            assert_eq!(allocator.inner.heap_size(), heap_size);
            assert_eq!(allocator.assert_consistent().free_blocks, 0);

            allocator.free(a, payload_for(3 * ALIGNMENT));
        });
    }

    #[test]
    fn test_alloc_extends_and_merges_with_trailing_free_block() {
        let chunk = 4 * ALIGNMENT;
        let config = exact().with_chunk_size(chunk);
        with_test_allocator(1 << 12, config, |allocator| unsafe {
            let request = 9 * ALIGNMENT;
            let a = allocator.alloc(payload_for(request)).unwrap();
            // The first block is reused, merged with the new space.
            let offset = a.addr().get() - allocator.heap_start().addr().get();
            assert_eq!(offset, 2 * ALIGNMENT);
            assert_eq!(
                allocator.inner.heap_size(),
                INITIAL_HEAP_SIZE + chunk + request
            );

            let report = allocator.assert_consistent();
            assert_eq!(report.free_blocks, 1);
            assert_eq!(report.free_bytes, chunk);

            allocator.free(a, payload_for(request));
        });
    }

    #[test]
    fn test_alloc_fails_when_heap_cannot_grow() {
        let config = exact().with_chunk_size(4 * ALIGNMENT);
        with_test_allocator(INITIAL_HEAP_SIZE + 4 * ALIGNMENT, config, |allocator| unsafe {
            let a = allocator.alloc(payload_for(4 * ALIGNMENT)).unwrap();
            assert!(allocator.alloc(1).is_none());
            assert!(allocator.alloc(1 << 20).is_none());
            allocator.assert_consistent();

            allocator.free(a, payload_for(4 * ALIGNMENT));
            assert!(allocator.alloc(1).is_some());
        });
    }

    fn four_blocks(allocator: &mut TestAllocator) -> [NonNull<u8>; 4] {
        let size = payload_for(MIN_BLOCK_SIZE);
        [(); 4].map(|()| allocator.alloc(size).unwrap())
    }

    #[test]
    fn test_coalesce_neither_neighbour_free() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let [_a, b, _c, _d] = four_blocks(allocator);
            allocator.free(b, payload_for(MIN_BLOCK_SIZE));

            let report = allocator.assert_consistent();
            assert_eq!(report.free_blocks, 2);
            assert_eq!(allocator.alloc(payload_for(MIN_BLOCK_SIZE)), Some(b));
        });
    }

    #[test]
    fn test_coalesce_with_right_neighbour() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let [a, b, _c, _d] = four_blocks(allocator);
            allocator.free(b, payload_for(MIN_BLOCK_SIZE));
            allocator.free(a, payload_for(MIN_BLOCK_SIZE));

            let report = allocator.assert_consistent();
            assert_eq!(report.free_blocks, 2);
            assert_eq!(allocator.alloc(payload_for(2 * MIN_BLOCK_SIZE)), Some(a));
        });
    }

    #[test]
    fn test_coalesce_with_left_neighbour() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let [_a, b, c, _d] = four_blocks(allocator);
            allocator.free(b, payload_for(MIN_BLOCK_SIZE));
            allocator.free(c, payload_for(MIN_BLOCK_SIZE));

            let report = allocator.assert_consistent();
            assert_eq!(report.free_blocks, 2);
            assert_eq!(allocator.alloc(payload_for(2 * MIN_BLOCK_SIZE)), Some(b));
        });
    }

    #[test]
    fn test_coalesce_with_both_neighbours() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let [a, b, c, _d] = four_blocks(allocator);
            allocator.free(a, payload_for(MIN_BLOCK_SIZE));
            allocator.free(c, payload_for(MIN_BLOCK_SIZE));
            assert_eq!(allocator.assert_consistent().free_blocks, 3);

            allocator.free(b, payload_for(MIN_BLOCK_SIZE));
            let report = allocator.assert_consistent();
            assert_eq!(report.free_blocks, 2);
            assert_eq!(allocator.alloc(payload_for(3 * MIN_BLOCK_SIZE)), Some(a));
        });
    }

    #[test]
    fn test_coalesce_everything_back_into_one_block() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let blocks = four_blocks(allocator);
            for ptr in [blocks[1], blocks[3], blocks[0], blocks[2]] {
                allocator.free(ptr, payload_for(MIN_BLOCK_SIZE));
            }
            let report = allocator.assert_consistent();
            assert_eq!(report.blocks, 1);
            assert_eq!(report.free_bytes, AllocatorConfig::DEFAULT_CHUNK_SIZE);
        });
    }

    #[test]
    fn test_free_none_is_noop() {
        with_test_allocator(1 << 16, AllocatorConfig::new(), |allocator| unsafe {
            allocator.inner.free(None);
            assert_eq!(allocator.assert_consistent().free_blocks, 1);
        });
    }

    #[test]
    fn test_realloc_null_and_zero() {
        with_test_allocator(1 << 16, AllocatorConfig::new(), |allocator| unsafe {
            let ptr = allocator.inner.realloc(None, 40).unwrap();
            assert!(allocator.inner.usable_size(ptr) >= 40);
            assert_eq!(allocator.assert_consistent().blocks, 2);

            assert!(allocator.inner.realloc(Some(ptr), 0).is_none());
            assert_eq!(allocator.assert_consistent().blocks, 1);
        });
    }

    #[test]
    fn test_realloc_within_capacity_keeps_pointer() {
        with_test_allocator(1 << 16, AllocatorConfig::new(), |allocator| unsafe {
            let a = allocator.alloc(500).unwrap();
            let capacity = allocator.inner.usable_size(a);
            assert_eq!(allocator.realloc(a, 500, 1), Some(a));
            assert_eq!(allocator.realloc(a, 1, capacity), Some(a));
            assert_eq!(allocator.inner.usable_size(a), capacity);
            allocator.assert_consistent();
        });
    }

    #[test]
    fn test_realloc_absorbs_free_right_neighbour() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let small = payload_for(MIN_BLOCK_SIZE);
            let [a, b, c, _d] = four_blocks(allocator);
            allocator.free(b, small);
            allocator.free(c, small);

            let grown = allocator.realloc(a, small, payload_for(3 * MIN_BLOCK_SIZE));
            assert_eq!(grown, Some(a));
            // The whole neighbour is absorbed, nothing is split off.
            assert_eq!(allocator.inner.usable_size(a), payload_for(3 * MIN_BLOCK_SIZE));
            assert_eq!(allocator.assert_consistent().free_blocks, 1);
        });
    }

    #[test]
    fn test_realloc_moves_and_copies() {
        with_test_allocator(1 << 16, exact(), |allocator| unsafe {
            let small = payload_for(MIN_BLOCK_SIZE);
            let [a, _b, _c, _d] = four_blocks(allocator);
            let moved = allocator.realloc(a, small, 4 * small).unwrap();
            assert_ne!(moved, a);
            assert!(allocator.inner.usable_size(moved) >= 4 * small);

            let report = allocator.assert_consistent();
            assert_eq!(report.free_blocks, 2);
            assert_eq!(allocator.alloc(small), Some(a));
        });
    }

    #[test]
    fn test_realloc_failure_keeps_original() {
        let config = exact().with_chunk_size(4 * ALIGNMENT);
        with_test_allocator(INITIAL_HEAP_SIZE + 4 * ALIGNMENT, config, |allocator| unsafe {
            let size = payload_for(4 * ALIGNMENT);
            let a = allocator.alloc(size).unwrap();
            assert!(allocator.inner.realloc(Some(a), 1 << 12).is_none());

            assert_eq!(allocator.inner.usable_size(a), size);
            let report = allocator.assert_consistent();
            assert_eq!(report.blocks, 1);
            assert_eq!(report.free_blocks, 0);
            // Contents survive: `free` verifies the fill pattern.
            allocator.free(a, size);
        });
    }

    #[test]
    fn test_try_variants_return_growth_error() {
        let config = exact().with_chunk_size(4 * ALIGNMENT);
        with_test_allocator(INITIAL_HEAP_SIZE + 4 * ALIGNMENT, config, |allocator| unsafe {
            let inner = &mut allocator.inner;
            assert!(matches!(inner.try_alloc(0), Ok(None)));

            let a = inner.try_alloc(payload_for(4 * ALIGNMENT)).unwrap().unwrap();
            let err = inner.try_alloc(1).unwrap_err();
            assert!(matches!(
                err,
                HeapError::Grow {
                    source: GrowError::Exhausted { .. },
                    ..
                }
            ));

            let err = inner.try_realloc(Some(a), 1 << 12).unwrap_err();
            assert!(matches!(err, HeapError::Grow { .. }));
            assert_eq!(inner.try_realloc(Some(a), 1).unwrap(), Some(a));
            assert_eq!(inner.try_realloc(Some(a), 0).unwrap(), None);
            assert!(inner.try_alloc(1).unwrap().is_some());
        });
    }
}
