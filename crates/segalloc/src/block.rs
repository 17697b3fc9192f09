//! Boundary-tag block format.
//!
//! Every block in the managed heap is framed by two identical tag words:
//!
//! ```text
//!            ┌────────┬──────────────────────────────┬────────┐
//!  block:    │ header │ payload (+ padding)          │ footer │
//!            └────────┴──────────────────────────────┴────────┘
//!            ▲        ▲
//!            │        └── BlockPtr (payload offset from the heap base)
//!            └── size | ALLOCATED
//!
//!  free block payload:  ┌──────┬──────┬─────────────┐
//!                       │ prev │ next │ ...         │
//!                       └──────┴──────┴─────────────┘
//! ```
//!
//! The recorded size covers header, payload and footer and is always a
//! multiple of [`ALIGNMENT`], which leaves the low bits of the tag word free
//! for flags. The footer lets a block find its left neighbour without any
//! separate index.
//!
//! All raw reads and writes of heap words go through [`HeapMemory`]. Every
//! access is bounds checked against the currently managed length, so a
//! corrupted size can at worst trigger a panic, never a write outside the
//! region handed out by the heap grower.

use core::{fmt, ptr::NonNull};

use bitflags::bitflags;

/// Size of a tag word in bytes.
pub const WORD_SIZE: usize = size_of::<usize>();

/// Alignment of every payload and granularity of every block size.
pub const ALIGNMENT: usize = 2 * WORD_SIZE;

/// Header, footer and two free-list links.
pub const MIN_BLOCK_SIZE: usize = 2 * ALIGNMENT;

const _: () = assert!(ALIGNMENT.is_power_of_two());

/// Padding word, prologue header, prologue footer and epilogue header.
pub(crate) const INITIAL_HEAP_SIZE: usize = 4 * WORD_SIZE;

/// The prologue is a permanently allocated, payload-less block.
pub(crate) const PROLOGUE: BlockPtr = BlockPtr::new(ALIGNMENT);

/// Payload offset of the first block after the prologue.
pub(crate) const FIRST_BLOCK: BlockPtr = BlockPtr::new(PROLOGUE.offset() + ALIGNMENT);

bitflags! {
    /// Flag bits stored below the size in a tag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TagFlags: usize {
        /// The block is handed out to a caller.
        const ALLOCATED = 1 << 0;
    }
}

/// A header or footer word: block size packed with its allocation state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(usize);

impl Tag {
    /// Zero-sized allocated header terminating the heap.
    pub const EPILOGUE: Self = Self::allocated(0);

    #[must_use]
    pub const fn allocated(size: usize) -> Self {
        Self::pack(size, TagFlags::ALLOCATED)
    }

    #[must_use]
    pub const fn free(size: usize) -> Self {
        Self::pack(size, TagFlags::empty())
    }

    const fn pack(size: usize, flags: TagFlags) -> Self {
        assert!(size.is_multiple_of(ALIGNMENT), "block size must be aligned");
        Self(size | flags.bits())
    }

    pub(crate) const fn from_bits(bits: usize) -> Self {
        Self(bits)
    }

    pub(crate) const fn bits(self) -> usize {
        self.0
    }

    /// Size of the whole block in bytes, tags included.
    #[must_use]
    pub const fn size(self) -> usize {
        self.0 & !(ALIGNMENT - 1)
    }

    #[must_use]
    pub const fn is_allocated(self) -> bool {
        TagFlags::from_bits_truncate(self.0).contains(TagFlags::ALLOCATED)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_allocated() { 'a' } else { 'f' };
        write!(f, "[{}:{state}]", self.size())
    }
}

/// Handle of a block: the offset of its payload from the heap base.
///
/// Blocks are never referenced by address inside the allocator, only by
/// offset, so the bookkeeping stays valid regardless of where the allocator
/// context itself lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0:#x}")]
pub struct BlockPtr(usize);

impl BlockPtr {
    pub(crate) const fn new(offset: usize) -> Self {
        Self(offset)
    }

    #[must_use]
    pub const fn offset(self) -> usize {
        self.0
    }

    const fn header_offset(self) -> usize {
        self.0 - WORD_SIZE
    }
}

/// Word-level view of the managed heap region.
pub(crate) struct HeapMemory {
    base: NonNull<u8>,
    len: usize,
}

impl HeapMemory {
    /// Creates a view over `base..base + len`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `base` is aligned to [`ALIGNMENT`]
    /// - `base..base + len` is valid for reads and writes and not used by
    ///   anything else for as long as this value exists
    pub(crate) unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        assert!(
            base.addr().get().is_multiple_of(ALIGNMENT),
            "heap base must be aligned"
        );
        Self { base, len }
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Address one past the last managed byte.
    pub(crate) fn end_addr(&self) -> usize {
        self.base.addr().get() + self.len
    }

    /// Takes the `additional` bytes after the current end under management.
    ///
    /// # Safety
    ///
    /// `end_addr()..end_addr() + additional` must satisfy the same
    /// requirements as the region passed to [`HeapMemory::new`].
    pub(crate) unsafe fn extend(&mut self, additional: usize) {
        self.len += additional;
    }

    fn word_ptr(&self, offset: usize) -> Option<*mut usize> {
        let in_bounds = offset.is_multiple_of(WORD_SIZE)
            && offset
                .checked_add(WORD_SIZE)
                .is_some_and(|end| end <= self.len);
        if !in_bounds {
            return None;
        }
        #[expect(clippy::cast_ptr_alignment)]
        let word = unsafe { self.base.as_ptr().add(offset) }.cast::<usize>();
        Some(word)
    }

    fn checked_word_ptr(&self, offset: usize) -> *mut usize {
        let Some(word) = self.word_ptr(offset) else {
            panic!(
                "heap word access out of bounds: offset={offset:#x}, len={:#x}",
                self.len
            );
        };
        word
    }

    pub(crate) fn try_read_word(&self, offset: usize) -> Option<usize> {
        self.word_ptr(offset).map(|word| unsafe { word.read() })
    }

    pub(crate) fn read_word(&self, offset: usize) -> usize {
        unsafe { self.checked_word_ptr(offset).read() }
    }

    pub(crate) fn write_word(&mut self, offset: usize, value: usize) {
        unsafe { self.checked_word_ptr(offset).write(value) }
    }

    pub(crate) fn header(&self, bp: BlockPtr) -> Tag {
        Tag::from_bits(self.read_word(bp.header_offset()))
    }

    pub(crate) fn try_header(&self, bp: BlockPtr) -> Option<Tag> {
        let offset = bp.offset().checked_sub(WORD_SIZE)?;
        self.try_read_word(offset).map(Tag::from_bits)
    }

    pub(crate) fn try_footer(&self, bp: BlockPtr) -> Option<Tag> {
        let size = self.try_header(bp)?.size();
        let offset = bp.offset().checked_add(size)?.checked_sub(ALIGNMENT)?;
        self.try_read_word(offset).map(Tag::from_bits)
    }

    pub(crate) fn set_header(&mut self, bp: BlockPtr, tag: Tag) {
        self.write_word(bp.header_offset(), tag.bits());
    }

    /// Writes `tag` to the header of `bp` and to the footer implied by
    /// `tag.size()`.
    pub(crate) fn set_tags(&mut self, bp: BlockPtr, tag: Tag) {
        self.set_header(bp, tag);
        self.write_word(bp.offset() + tag.size() - ALIGNMENT, tag.bits());
    }

    /// Footer of the block immediately to the left of `bp`.
    pub(crate) fn prev_footer(&self, bp: BlockPtr) -> Tag {
        Tag::from_bits(self.read_word(bp.offset() - ALIGNMENT))
    }

    /// Must not be called on the epilogue.
    pub(crate) fn next_block(&self, bp: BlockPtr) -> BlockPtr {
        BlockPtr(bp.offset() + self.header(bp).size())
    }

    /// Must not be called on the prologue.
    pub(crate) fn prev_block(&self, bp: BlockPtr) -> BlockPtr {
        BlockPtr(bp.offset() - self.prev_footer(bp).size())
    }

    pub(crate) fn payload(&self, bp: BlockPtr) -> NonNull<u8> {
        assert!(bp.offset() <= self.len, "block {bp} is outside of the heap");
        unsafe { self.base.add(bp.offset()) }
    }

    /// Maps a payload pointer handed out earlier back to its block.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` cannot be a payload of this heap.
    pub(crate) fn block_of(&self, ptr: NonNull<u8>) -> BlockPtr {
        let offset = ptr.addr().get().checked_sub(self.base.addr().get());
        let Some(offset) = offset.filter(|&offset| {
            offset >= FIRST_BLOCK.offset() && offset < self.len && offset.is_multiple_of(ALIGNMENT)
        }) else {
            panic!("pointer {ptr:p} was not allocated from this heap");
        };
        BlockPtr(offset)
    }

    /// Copies the first `len` payload bytes of `src` into `dst`.
    pub(crate) fn copy_payload(&mut self, src: BlockPtr, dst: BlockPtr, len: usize) {
        assert!(len <= self.header(src).size() - ALIGNMENT);
        assert!(len <= self.header(dst).size() - ALIGNMENT);
        assert_ne!(src, dst);
        unsafe {
            self.payload(src)
                .copy_to_nonoverlapping(self.payload(dst), len);
        }
    }
}
