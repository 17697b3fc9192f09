use snafu::Snafu;
use snafu_utils::Location;

use crate::block::{ALIGNMENT, MIN_BLOCK_SIZE};

/// Failure reported by a [`HeapGrower`](crate::HeapGrower).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GrowError {
    #[snafu(display(
        "heap region exhausted: requested {requested} bytes, {available} available"
    ))]
    Exhausted {
        requested: usize,
        available: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("heap growth by {requested} bytes refused"))]
    Refused {
        requested: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

impl GrowError {
    /// The grower has only `available` bytes left.
    #[must_use]
    #[track_caller]
    pub fn exhausted(requested: usize, available: usize) -> Self {
        ExhaustedSnafu {
            requested,
            available,
        }
        .build()
    }

    /// The grower cannot tell how much is left, only that this request fails.
    #[must_use]
    #[track_caller]
    pub fn refused(requested: usize) -> Self {
        RefusedSnafu { requested }.build()
    }
}

/// Errors raised while initializing or extending the managed heap.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HeapError {
    #[snafu(display(
        "invalid chunk size {chunk_size}: must be a multiple of {} and at least {}",
        ALIGNMENT,
        MIN_BLOCK_SIZE
    ))]
    InvalidChunkSize {
        chunk_size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("heap base {address:#x} is not aligned to {}", ALIGNMENT))]
    MisalignedBase {
        address: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("heap grew non-contiguously: expected {expected:#x}, got {found:#x}"))]
    NonContiguous {
        expected: usize,
        found: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("heap extension by {words} words overflows"))]
    SizeOverflow {
        words: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to extend the heap by {size} bytes"))]
    Grow {
        size: usize,
        #[snafu(source)]
        source: GrowError,
        #[snafu(implicit)]
        location: Location,
    },
}
