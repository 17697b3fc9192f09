//! Segregated free-list index.
//!
//! Free blocks are threaded onto one of [`CLASS_COUNT`] circular
//! doubly-linked lists according to their size in words:
//!
//! | class | words   |
//! |-------|---------|
//! | 0     | (0, 4]  |
//! | 1     | (4, 8]  |
//! | 2     | (8, 16] |
//! | 3     | (16, 32]|
//! | 4     | (32, ∞) |
//!
//! The links live inside the free blocks themselves (first payload word is
//! `prev`, second is `next`) and are stored as encoded [`Node`]s, so a list
//! never holds an address. Each class has a sentinel kept in [`FreeLists`];
//! sentinel handles are encoded as the class index, which can never collide
//! with a real payload offset.

use crate::block::{ALIGNMENT, BlockPtr, FIRST_BLOCK, HeapMemory, WORD_SIZE};

/// Number of segregated size classes.
pub const CLASS_COUNT: usize = 5;

/// Inclusive upper bound, in words, of every class but the last.
const CLASS_LIMITS: [usize; CLASS_COUNT - 1] = [4, 8, 16, 32];

/// Link value written into a block once it leaves its list.
const UNLINKED: usize = usize::MAX;

const PREV_SLOT: usize = 0;
const NEXT_SLOT: usize = WORD_SIZE;

const _: () = assert!(CLASS_COUNT <= FIRST_BLOCK.offset());
const _: () = assert!(FIRST_BLOCK.offset().is_multiple_of(ALIGNMENT));

/// Size class of a free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("#{_0}")]
pub struct SizeClass(usize);

impl SizeClass {
    /// Maps a block size in words to its class.
    #[must_use]
    pub const fn classify(words: usize) -> Self {
        let mut index = 0;
        while index < CLASS_LIMITS.len() {
            if words <= CLASS_LIMITS[index] {
                return Self(index);
            }
            index += 1;
        }
        Self(CLASS_LIMITS.len())
    }

    /// Maps a block size in bytes to its class.
    #[must_use]
    pub const fn of_block_size(size: usize) -> Self {
        Self::classify(size / WORD_SIZE)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Every class, smallest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CLASS_COUNT).map(Self)
    }

    /// This class followed by every larger one.
    pub fn and_larger(self) -> impl Iterator<Item = Self> {
        (self.0..CLASS_COUNT).map(Self)
    }
}

/// A position in a class list: either its sentinel or a free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
    Sentinel(SizeClass),
    Block(BlockPtr),
}

impl Node {
    fn encode(self) -> usize {
        match self {
            Self::Sentinel(class) => class.index(),
            Self::Block(bp) => {
                debug_assert!(bp.offset() >= FIRST_BLOCK.offset());
                bp.offset()
            }
        }
    }

    fn decode(word: usize) -> Option<Self> {
        match word {
            UNLINKED => None,
            class if class < CLASS_COUNT => Some(Self::Sentinel(SizeClass(class))),
            offset => Some(Self::Block(BlockPtr::new(offset))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Links {
    prev: Node,
    next: Node,
}

impl Links {
    const fn empty(class: SizeClass) -> Self {
        Self {
            prev: Node::Sentinel(class),
            next: Node::Sentinel(class),
        }
    }
}

/// Sentinels of every class list.
///
/// Block links are read from and written to the heap, so every operation
/// that may touch a block takes the [`HeapMemory`] it lives in.
#[derive(Debug)]
pub(crate) struct FreeLists {
    sentinels: [Links; CLASS_COUNT],
}

impl FreeLists {
    pub(crate) const fn new() -> Self {
        let mut sentinels = [Links::empty(SizeClass(0)); CLASS_COUNT];
        let mut index = 0;
        while index < CLASS_COUNT {
            sentinels[index] = Links::empty(SizeClass(index));
            index += 1;
        }
        Self { sentinels }
    }

    fn try_link(&self, heap: &HeapMemory, node: Node, slot: usize) -> Option<Node> {
        match node {
            Node::Sentinel(class) => {
                let links = &self.sentinels[class.index()];
                Some(if slot == NEXT_SLOT { links.next } else { links.prev })
            }
            Node::Block(bp) => heap
                .try_read_word(bp.offset().checked_add(slot)?)
                .and_then(Node::decode),
        }
    }

    fn link(&self, heap: &HeapMemory, node: Node, slot: usize) -> Node {
        let Some(link) = self.try_link(heap, node, slot) else {
            panic!("free-list node {node:?} is not linked into any class");
        };
        link
    }

    fn set_link(&mut self, heap: &mut HeapMemory, node: Node, slot: usize, value: Node) {
        match node {
            Node::Sentinel(class) => {
                let links = &mut self.sentinels[class.index()];
                if slot == NEXT_SLOT {
                    links.next = value;
                } else {
                    links.prev = value;
                }
            }
            Node::Block(bp) => heap.write_word(bp.offset() + slot, value.encode()),
        }
    }

    /// `next` link of `node`, or `None` when it is unlinked or unreadable.
    pub(crate) fn try_next(&self, heap: &HeapMemory, node: Node) -> Option<Node> {
        self.try_link(heap, node, NEXT_SLOT)
    }

    /// `prev` link of `node`, or `None` when it is unlinked or unreadable.
    pub(crate) fn try_prev(&self, heap: &HeapMemory, node: Node) -> Option<Node> {
        self.try_link(heap, node, PREV_SLOT)
    }

    /// Pushes the free block `bp` onto the front of its class list.
    ///
    /// The class is taken from the block's header, which must already hold
    /// its final size.
    pub(crate) fn insert(&mut self, heap: &mut HeapMemory, bp: BlockPtr) {
        let tag = heap.header(bp);
        debug_assert!(!tag.is_allocated(), "inserting allocated block {bp}");
        let class = SizeClass::of_block_size(tag.size());
        let head = Node::Sentinel(class);
        let first = self.link(heap, head, NEXT_SLOT);
        let node = Node::Block(bp);

        self.set_link(heap, node, NEXT_SLOT, first);
        self.set_link(heap, node, PREV_SLOT, head);
        self.set_link(heap, first, PREV_SLOT, node);
        self.set_link(heap, head, NEXT_SLOT, node);
    }

    /// Unlinks `bp` from whichever list it is on.
    pub(crate) fn remove(&mut self, heap: &mut HeapMemory, bp: BlockPtr) {
        let node = Node::Block(bp);
        let prev = self.link(heap, node, PREV_SLOT);
        let next = self.link(heap, node, NEXT_SLOT);

        self.set_link(heap, prev, NEXT_SLOT, next);
        self.set_link(heap, next, PREV_SLOT, prev);
        heap.write_word(bp.offset() + PREV_SLOT, UNLINKED);
        heap.write_word(bp.offset() + NEXT_SLOT, UNLINKED);
    }

    /// Iterates over the blocks of `class` in list order.
    pub(crate) fn iter<'a>(&'a self, heap: &'a HeapMemory, class: SizeClass) -> ClassIter<'a> {
        ClassIter {
            lists: self,
            heap,
            class,
            cursor: Node::Sentinel(class),
        }
    }

    /// First-fit search for a block of at least `size` bytes.
    ///
    /// Scans the class `size` belongs to, then every larger class; a block
    /// from a smaller class can never be large enough.
    pub(crate) fn find_fit(&self, heap: &HeapMemory, size: usize) -> Option<BlockPtr> {
        SizeClass::of_block_size(size)
            .and_larger()
            .find_map(|class| self.iter(heap, class).find(|&bp| heap.header(bp).size() >= size))
    }
}

pub(crate) struct ClassIter<'a> {
    lists: &'a FreeLists,
    heap: &'a HeapMemory,
    class: SizeClass,
    cursor: Node,
}

impl Iterator for ClassIter<'_> {
    type Item = BlockPtr;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lists.link(self.heap, self.cursor, NEXT_SLOT) {
            Node::Block(bp) => {
                self.cursor = Node::Block(bp);
                Some(bp)
            }
            Node::Sentinel(class) => {
                assert_eq!(class, self.class, "free list {} is cross-linked", self.class);
                self.cursor = Node::Sentinel(class);
                None
            }
        }
    }
}
