//! Heap consistency checker.
//!
//! The checker only reads. It walks the block sequence from the first block
//! to the epilogue and then every class list from its sentinel, using the
//! non-panicking accessors of [`HeapMemory`] so that a corrupted heap is
//! reported rather than crashing the check itself.

use arrayvec::ArrayVec;

use crate::{
    block::{ALIGNMENT, BlockPtr, FIRST_BLOCK, HeapMemory, MIN_BLOCK_SIZE, PROLOGUE, Tag},
    free_list::{FreeLists, Node, SizeClass},
};

/// Number of violations kept in a [`HeapReport`]; later ones are only
/// counted.
pub const MAX_REPORTED_VIOLATIONS: usize = 16;

/// A single inconsistency found by [`check_heap`].
///
/// [`check_heap`]: crate::SegregatedAllocator::check_heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum HeapViolation {
    #[display("bad prologue: header {header}, footer {footer}")]
    BadPrologue { header: Tag, footer: Tag },
    #[display("bad epilogue at {block}: {tag}")]
    BadEpilogue { block: BlockPtr, tag: Tag },
    #[display("block {block} is not aligned to {}", ALIGNMENT)]
    Misaligned { block: BlockPtr },
    #[display("block {block}: header {header} does not match footer {footer}")]
    TagMismatch {
        block: BlockPtr,
        header: Tag,
        footer: Tag,
    },
    #[display("block {block} is smaller than a minimum block: {size}")]
    Undersized { block: BlockPtr, size: usize },
    #[display("free block {block} follows another free block")]
    Uncoalesced { block: BlockPtr },
    #[display("block {block} runs past the end of the heap")]
    Truncated { block: BlockPtr },
    #[display("free list {class}: broken link at {block}")]
    BrokenLink { class: SizeClass, block: BlockPtr },
    #[display("free list {class}: sentinel links are inconsistent")]
    BrokenSentinel { class: SizeClass },
    #[display("free list {class}: block {block} is allocated")]
    ListedAllocated { class: SizeClass, block: BlockPtr },
    #[display("free list {class}: block {block} belongs to list {expected}")]
    Misfiled {
        class: SizeClass,
        block: BlockPtr,
        expected: SizeClass,
    },
    #[display("free list {class} does not return to its sentinel")]
    Cycle { class: SizeClass },
    #[display("{in_heap} free blocks in the heap but {in_lists} in the free lists")]
    FreeCountMismatch { in_heap: usize, in_lists: usize },
}

/// Result of a heap check.
#[derive(Debug, Clone, Default)]
pub struct HeapReport {
    /// Blocks between the prologue and the epilogue.
    pub blocks: usize,
    pub free_blocks: usize,
    /// Blocks reachable from the class sentinels.
    pub listed_blocks: usize,
    /// Sum of the sizes of all free blocks, tags included.
    pub free_bytes: usize,
    violations: ArrayVec<HeapViolation, MAX_REPORTED_VIOLATIONS>,
    suppressed: usize,
}

impl HeapReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// The first [`MAX_REPORTED_VIOLATIONS`] violations found.
    #[must_use]
    pub fn violations(&self) -> &[HeapViolation] {
        &self.violations
    }

    /// Violations found beyond [`MAX_REPORTED_VIOLATIONS`].
    #[must_use]
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    fn record(&mut self, violation: HeapViolation) {
        if self.violations.try_push(violation).is_err() {
            self.suppressed += 1;
        }
    }

    pub(crate) fn log_violations(&self) {
        for violation in &self.violations {
            log::error!("heap check: {violation}");
        }
        if self.suppressed > 0 {
            log::error!("heap check: {} more violations", self.suppressed);
        }
    }
}

pub(crate) fn check(heap: &HeapMemory, lists: &FreeLists, verbose: bool) -> HeapReport {
    let mut report = HeapReport::default();
    if verbose {
        log::info!("heap ({:p}, {} bytes):", heap.base(), heap.len());
    }

    check_prologue(heap, &mut report);
    walk_blocks(heap, verbose, &mut report);
    for class in SizeClass::all() {
        walk_list(heap, lists, class, &mut report);
    }

    if report.free_blocks != report.listed_blocks {
        report.record(HeapViolation::FreeCountMismatch {
            in_heap: report.free_blocks,
            in_lists: report.listed_blocks,
        });
    }
    report
}

fn check_prologue(heap: &HeapMemory, report: &mut HeapReport) {
    let expected = Tag::allocated(ALIGNMENT);
    let header = heap.header(PROLOGUE);
    let footer = heap.try_footer(PROLOGUE).unwrap_or(Tag::EPILOGUE);
    if header != expected || footer != expected {
        report.record(HeapViolation::BadPrologue { header, footer });
    }
}

fn walk_blocks(heap: &HeapMemory, verbose: bool, report: &mut HeapReport) {
    let mut bp = FIRST_BLOCK;
    let mut prev_free = false;
    loop {
        let Some(header) = heap.try_header(bp) else {
            report.record(HeapViolation::Truncated { block: bp });
            return;
        };
        if header.size() == 0 {
            if verbose {
                log::info!("{bp}: epilogue: {header}");
            }
            if !header.is_allocated() || bp.offset() != heap.len() {
                report.record(HeapViolation::BadEpilogue { block: bp, tag: header });
            }
            break;
        }
        let Some(footer) = heap.try_footer(bp) else {
            report.record(HeapViolation::Truncated { block: bp });
            return;
        };
        if verbose {
            log::info!("{bp}: header: {header} footer: {footer}");
        }

        if header != footer {
            report.record(HeapViolation::TagMismatch {
                block: bp,
                header,
                footer,
            });
        }
        if header.size() < MIN_BLOCK_SIZE {
            report.record(HeapViolation::Undersized {
                block: bp,
                size: header.size(),
            });
        }

        report.blocks += 1;
        let free = !header.is_allocated();
        if free {
            report.free_blocks += 1;
            report.free_bytes += header.size();
            if prev_free {
                report.record(HeapViolation::Uncoalesced { block: bp });
            }
        }
        prev_free = free;

        let Some(next) = bp.offset().checked_add(header.size()) else {
            report.record(HeapViolation::Truncated { block: bp });
            return;
        };
        bp = BlockPtr::new(next);
    }
    if verbose {
        log::info!("end of heap");
    }
}

fn walk_list(heap: &HeapMemory, lists: &FreeLists, class: SizeClass, report: &mut HeapReport) {
    let mut node = Node::Sentinel(class);

    loop {
        let Some(next) = lists.try_next(heap, node) else {
            report.record(broken(class, node));
            return;
        };

        let bp = match next {
            Node::Sentinel(last) => {
                if last != class || lists.try_prev(heap, next) != Some(node) {
                    report.record(broken(class, node));
                }
                return;
            }
            Node::Block(bp) => bp,
        };

        if next == node {
            report.record(HeapViolation::Cycle { class });
            return;
        }
        if !bp.offset().is_multiple_of(ALIGNMENT) {
            report.record(HeapViolation::Misaligned { block: bp });
            return;
        }
        // A cycle that does not pass through the sentinel breaks the `prev`
        // symmetry where it re-enters, so it surfaces as a broken link.
        let in_heap =
            bp.offset() >= FIRST_BLOCK.offset() && lists.try_prev(heap, next) == Some(node);
        let Some(tag) = heap.try_header(bp).filter(|_| in_heap) else {
            report.record(HeapViolation::BrokenLink { class, block: bp });
            return;
        };

        report.listed_blocks += 1;
        if tag.is_allocated() {
            report.record(HeapViolation::ListedAllocated { class, block: bp });
        } else {
            let expected = SizeClass::of_block_size(tag.size());
            if expected != class {
                report.record(HeapViolation::Misfiled {
                    class,
                    block: bp,
                    expected,
                });
            }
        }
        node = next;
    }
}

fn broken(class: SizeClass, node: Node) -> HeapViolation {
    match node {
        Node::Block(block) => HeapViolation::BrokenLink { class, block },
        Node::Sentinel(_) => HeapViolation::BrokenSentinel { class },
    }
}
