use snafu::ensure;

use crate::{
    block::{ALIGNMENT, MIN_BLOCK_SIZE},
    error::{HeapError, InvalidChunkSizeSnafu},
};

/// Tunable placement policy of a [`SegregatedAllocator`](crate::SegregatedAllocator).
///
/// By default the heap grows in 8 KiB chunks and requests of up to 512 bytes
/// are rounded up to a power of two before the block size is computed. The
/// rounding only affects placement, never correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    chunk_size: usize,
    small_request_limit: usize,
    round_small_requests: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocatorConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 1 << 13;
    pub const DEFAULT_SMALL_REQUEST_LIMIT: usize = 512;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            small_request_limit: Self::DEFAULT_SMALL_REQUEST_LIMIT,
            round_small_requests: true,
        }
    }

    /// Minimum number of bytes requested from the grower per extension.
    ///
    /// Must be a multiple of [`ALIGNMENT`] and at least [`MIN_BLOCK_SIZE`];
    /// this is checked by [`SegregatedAllocator::init`](crate::SegregatedAllocator::init).
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Largest request that is rounded up to a power of two.
    #[must_use]
    pub const fn with_small_request_limit(mut self, limit: usize) -> Self {
        self.small_request_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_small_request_rounding(mut self, enabled: bool) -> Self {
        self.round_small_requests = enabled;
        self
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub const fn small_request_limit(&self) -> usize {
        self.small_request_limit
    }

    #[must_use]
    pub const fn rounds_small_requests(&self) -> bool {
        self.round_small_requests
    }

    pub(crate) fn validate(&self) -> Result<(), HeapError> {
        ensure!(
            self.chunk_size >= MIN_BLOCK_SIZE && self.chunk_size.is_multiple_of(ALIGNMENT),
            InvalidChunkSizeSnafu {
                chunk_size: self.chunk_size
            }
        );
        Ok(())
    }

    /// Block size, tags included, used to serve a request of `size` bytes.
    ///
    /// Returns `None` for zero-sized requests and for sizes whose block would
    /// not be representable.
    #[must_use]
    pub fn block_size_for(&self, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        let size = if self.round_small_requests && size <= self.small_request_limit {
            size.checked_next_power_of_two()?
        } else {
            size
        };
        if size <= ALIGNMENT {
            return Some(MIN_BLOCK_SIZE);
        }
        size.checked_add(ALIGNMENT)?.checked_next_multiple_of(ALIGNMENT)
    }
}
