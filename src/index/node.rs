//! The physical layout free blocks borrow while they sit in an index.
//!
//! spec.md §9 calls this out directly: the same bytes serve as either a
//! tree/list node or a duplicate-list node depending on how the block is
//! currently reachable. Rather than model that as two Rust types racing to
//! alias the same memory, [`Node`] exposes the four raw word slots every
//! C.2/C.3 variant needs and lets each caller name them according to its
//! current role:
//!
//! - As a **representative with no duplicates**: `slot0`/`slot1` are the
//!   tree children, `slot2` is the sentinel (no duplicates).
//! - As a **representative with duplicates**: same, but `slot2` points at
//!   the head duplicate.
//! - As a **duplicate**: `slot0`/`slot1` are the previous/next duplicate,
//!   `slot2` is meaningful only on the head duplicate, where it stores the
//!   tree parent of the representative (the overloaded "aux" field spec.md
//!   4.D describes) so removing the representative can promote the head
//!   without re-searching the tree.
//!
//! `slot3` exists only for variants that keep a persistent parent pointer
//! on representatives (CLRS-faithful, unified-symmetry); the stack-based
//! and top-down variants never allocate it and size their minimum block
//! accordingly.

use crate::block::BlockPtr;

/// A free block viewed as an index entry: four raw pointer-sized slots
/// immediately following the header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Node(BlockPtr);

impl Node {
    #[must_use]
    pub const fn new(block: BlockPtr) -> Self {
        Self(block)
    }

    #[must_use]
    pub const fn block(self) -> BlockPtr {
        self.0
    }

    unsafe fn slot_ptr(self, slot: usize) -> *mut u64 {
        unsafe { self.0.client_space().cast::<u64>().add(slot) }
    }

    fn get(self, slot: usize) -> BlockPtr {
        let addr = unsafe { self.slot_ptr(slot).read() } as usize;
        unsafe { BlockPtr::from_addr(addr) }
    }

    fn set(self, slot: usize, value: BlockPtr) {
        unsafe { self.slot_ptr(slot).write(value.addr() as u64) };
    }

    // --- tree-role accessors ---

    #[must_use]
    pub fn left(self) -> BlockPtr {
        self.get(0)
    }

    pub fn set_left(self, v: BlockPtr) {
        self.set(0, v);
    }

    #[must_use]
    pub fn right(self) -> BlockPtr {
        self.get(1)
    }

    pub fn set_right(self, v: BlockPtr) {
        self.set(1, v);
    }

    #[must_use]
    pub fn list_start(self) -> BlockPtr {
        self.get(2)
    }

    pub fn set_list_start(self, v: BlockPtr) {
        self.set(2, v);
    }

    /// Persistent parent pointer. Only meaningful for CLRS-faithful and
    /// unified-symmetry representatives; other variants never read it.
    #[must_use]
    pub fn parent(self) -> BlockPtr {
        self.get(3)
    }

    pub fn set_parent(self, v: BlockPtr) {
        self.set(3, v);
    }

    // --- duplicate-role accessors (same slots, different names) ---

    #[must_use]
    pub fn prev_dup(self) -> BlockPtr {
        self.get(0)
    }

    pub fn set_prev_dup(self, v: BlockPtr) {
        self.set(0, v);
    }

    #[must_use]
    pub fn next_dup(self) -> BlockPtr {
        self.get(1)
    }

    pub fn set_next_dup(self, v: BlockPtr) {
        self.set(1, v);
    }

    /// Overloaded field: on the head duplicate, the representative's tree
    /// parent; meaningless on every other duplicate.
    #[must_use]
    pub fn aux_parent(self) -> BlockPtr {
        self.get(2)
    }

    pub fn set_aux_parent(self, v: BlockPtr) {
        self.set(2, v);
    }
}
