extern crate alloc;

use alloc::alloc::Layout;
use core::ptr::NonNull;

use crate::{
    AllocatorConfig, HeapReport, RegionGrower, SegregatedAllocator, block::ALIGNMENT,
};

/// Wraps an allocator so that every live byte is filled with `0x33` and
/// checked again before it is released.
pub(crate) struct TestAllocator {
    pub(crate) inner: SegregatedAllocator<RegionGrower>,
    start: NonNull<u8>,
}

impl TestAllocator {
    pub(crate) fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.inner.alloc(size)?;
        assert!(ptr.addr().get().is_multiple_of(ALIGNMENT));
        unsafe {
            ptr.write_bytes(0x33, size);
        }
        Some(ptr)
    }

    pub(crate) unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize) {
        unsafe {
            assert_filled(ptr, size);
            ptr.write_bytes(0x55, size);
            self.inner.free(Some(ptr));
        }
    }

    pub(crate) unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        unsafe {
            assert_filled(ptr, old_size);
            let new_ptr = self.inner.realloc(Some(ptr), new_size)?;
            assert_filled(new_ptr, usize::min(old_size, new_size));
            new_ptr.write_bytes(0x33, new_size);
            Some(new_ptr)
        }
    }

    pub(crate) fn heap_start(&self) -> NonNull<u8> {
        self.start
    }

    pub(crate) fn assert_consistent(&self) -> HeapReport {
        let report = self.inner.check_heap(false);
        assert!(report.is_consistent(), "{report:#?}");
        report
    }
}

unsafe fn assert_filled(ptr: NonNull<u8>, size: usize) {
    for i in 0..size {
        assert_eq!(unsafe { ptr.add(i).read() }, 0x33);
    }
}

pub(crate) fn with_test_heap<F>(heap_size: usize, test_fn: F)
where
    F: FnOnce(NonNull<u8>, usize),
{
    unsafe {
        let layout = Layout::from_size_align(heap_size, ALIGNMENT).unwrap();
        let heap_start = NonNull::new(alloc::alloc::alloc(layout)).unwrap();
        heap_start.write_bytes(0x11, heap_size);
        test_fn(heap_start, heap_size);
        alloc::alloc::dealloc(heap_start.as_ptr(), layout);
    }
}

pub(crate) fn with_test_allocator<F>(size: usize, config: AllocatorConfig, test_fn: F)
where
    F: FnOnce(&mut TestAllocator),
{
    with_test_heap(size, |heap_start, heap_size| {
        let grower = unsafe { RegionGrower::new(heap_start, heap_size) };
        let inner = SegregatedAllocator::init(grower, config).unwrap();
        test_fn(&mut TestAllocator {
            inner,
            start: heap_start,
        });
    });
}
