use core::{
    alloc::{GlobalAlloc, Layout},
    mem,
    ptr::{self, NonNull},
};

use snafu_utils::Report;
use spin::Mutex;

use crate::{
    AllocatorConfig, HeapError, HeapReport, SegregatedAllocator, block::ALIGNMENT,
    grow::HeapGrower,
};

/// A [`SegregatedAllocator`] behind a spin lock, usable as the global
/// allocator.
///
/// The heap is initialized on first use, so the wrapper can be built in a
/// `static`. If initialization fails the error is logged once and every
/// later allocation returns null.
///
/// Nothing is logged while the lock is held, so a logger that allocates
/// through this allocator is fine.
///
/// Layouts aligned to more than [`ALIGNMENT`] are not supported and are
/// refused with a null pointer.
pub struct LockedAllocator<G> {
    inner: Mutex<Slot<G>>,
}

enum Slot<G> {
    Pending { grower: G, config: AllocatorConfig },
    Ready(SegregatedAllocator<G>),
    Failed,
}

impl<G> Slot<G>
where
    G: HeapGrower,
{
    /// Builds the heap on first call. The error is returned only once; the
    /// slot stays `Failed` afterwards.
    fn init_if_pending(&mut self) -> Result<(), HeapError> {
        if matches!(self, Self::Pending { .. })
            && let Self::Pending { grower, config } = mem::replace(self, Self::Failed)
        {
            *self = Self::Ready(SegregatedAllocator::init(grower, config)?);
        }
        Ok(())
    }

    fn ready_mut(&mut self) -> Option<&mut SegregatedAllocator<G>> {
        match self {
            Self::Ready(allocator) => Some(allocator),
            Self::Pending { .. } | Self::Failed => None,
        }
    }
}

impl<G> LockedAllocator<G> {
    #[must_use]
    pub const fn new(grower: G, config: AllocatorConfig) -> Self {
        Self {
            inner: Mutex::new(Slot::Pending { grower, config }),
        }
    }
}

impl<G> LockedAllocator<G>
where
    G: HeapGrower,
{
    /// Runs `f` with the lock held, initializing the heap first if needed.
    ///
    /// Returns `None` if the heap could not be initialized. An initialization
    /// failure is logged after the lock has been released.
    ///
    /// `f` must not log or allocate through this allocator: the installed
    /// logger may itself allocate, and the lock is not reentrant. Use the
    /// `try_` methods of [`SegregatedAllocator`] inside `f`.
    pub fn with_allocator<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut SegregatedAllocator<G>) -> R,
    {
        let (init, result) = {
            let mut slot = self.inner.lock();
            let init = slot.init_if_pending();
            (init, slot.ready_mut().map(f))
        };
        if let Err(err) = init {
            log::error!("heap initialization failed: {}", Report::new(err));
        }
        result
    }

    /// Checks the heap under the lock and logs any violation once the lock
    /// has been released.
    pub fn check_heap(&self) -> Option<HeapReport> {
        let report = self.with_allocator(|allocator| allocator.check_heap_silently())?;
        report.log_violations();
        Some(report)
    }
}

type Outcome = Option<Result<Option<NonNull<u8>>, HeapError>>;

fn into_raw(outcome: Outcome, op: &str, size: usize) -> *mut u8 {
    match outcome {
        Some(Ok(ptr)) => ptr.map_or(ptr::null_mut(), NonNull::as_ptr),
        Some(Err(err)) => {
            log::warn!("{op}({size}) failed: {err}");
            ptr::null_mut()
        }
        None => ptr::null_mut(),
    }
}

unsafe impl<G> GlobalAlloc for LockedAllocator<G>
where
    G: HeapGrower,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        let result = self.with_allocator(|allocator| allocator.try_alloc(layout.size()));
        into_raw(result, "alloc", layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.with_allocator(|allocator| unsafe { allocator.free(NonNull::new(ptr)) });
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        let result = self.with_allocator(|allocator| unsafe {
            allocator.try_realloc(NonNull::new(ptr), new_size)
        });
        into_raw(result, "realloc", new_size)
    }
}
