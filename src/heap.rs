//! Component E: the allocator facade (spec.md 4.E).
//!
//! `Heap<I>` is the value-typed instance spec.md §9's "Global mutable
//! state" re-architecture note asks for (see [`crate::config`] and
//! `DESIGN.md`): everything the original design kept in two process-wide
//! structs — segment extents and the index's root/sentinels/totals — lives
//! here instead, owned by one `Heap<I>` per managed segment. `I: FreeIndex`
//! selects which of the seven variants in [`crate::index`] backs the
//! allocator; `malloc`/`realloc`/`free` are otherwise identical regardless
//! of `I`.

use core::ptr;

use crate::block::{round_up, BlockPtr, WORD};
use crate::coalesce::coalesce;
use crate::config::MAX_REQUEST;
use crate::error::HeapError;
use crate::index::FreeIndex;

/// A single-threaded, boundary-tag heap over a caller-supplied segment.
///
/// `Heap<I>` owns no memory of its own — it only ever reads and writes
/// bytes inside `[base, end)`, which the caller handed over at [`Heap::init`]
/// and must keep alive and exclusive for as long as this value is used
/// (spec.md §5's resource-ownership contract). Every mutating method takes
/// `&mut self`, so the borrow checker enforces the "not re-entrant" half of
/// that contract; the raw addresses inside [`BlockPtr`] also mean `Heap`
/// is neither [`Send`] nor [`Sync`], so it can't silently leak across
/// threads either.
pub struct Heap<I: FreeIndex> {
    base: usize,
    /// Address of the end-of-segment sentinel (spec.md's `segment_end`).
    end: usize,
    sentinel: BlockPtr,
    index: I,
    initialized: bool,
}

impl<I: FreeIndex> Default for Heap<I> {
    fn default() -> Self {
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self {
            base: 0,
            end: 0,
            sentinel: nil,
            index: I::default(),
            initialized: false,
        }
    }
}

impl<I: FreeIndex> Heap<I> {
    /// Construct an uninitialized heap. Every method besides `init`/
    /// `init_checked` is a no-op or returns a failure value until `init`
    /// succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the heap over `[base, base + size)`, discarding whatever
    /// this instance previously managed. Returns `false` (spec.md §6) on
    /// failure, with no state installed.
    ///
    /// # Safety
    /// `base` must point to `size` bytes that are valid, writable, and not
    /// observed by anyone else for as long as this `Heap` is in use
    /// afterward (spec.md §5). `base` need not itself be aligned; `init`
    /// rounds the usable region down to the required alignment.
    #[must_use]
    pub unsafe fn init(&mut self, base: *mut u8, size: usize) -> bool {
        unsafe { self.init_checked(base, size) }.is_ok()
    }

    /// Same as [`Self::init`] but reports *why* a too-small segment was
    /// rejected, for callers debugging a broken setup (spec.md §7's
    /// `InitTooSmall`).
    ///
    /// # Safety
    /// Same requirements as [`Self::init`].
    pub unsafe fn init_checked(&mut self, base: *mut u8, size: usize) -> Result<(), HeapError> {
        let usable = size & !(crate::block::ALIGN - 1);
        let needed = I::MIN_BLOCK_SIZE + WORD;
        if usable < needed {
            return Err(HeapError::InitTooSmall { given: size, needed });
        }

        let base_addr = base as usize;
        let sentinel_addr = base_addr + usable - WORD;
        let sentinel = unsafe { BlockPtr::from_addr(sentinel_addr) };
        let first = unsafe { BlockPtr::from_addr(base_addr) };
        let first_payload = usable - 2 * WORD;

        first.init_header(first_payload, false, true);
        first.write_footer();
        sentinel.init_header(0, crate::config::SENTINEL_ALLOC_BIT, false);

        let mut index = I::default();
        index.set_sentinel(sentinel);
        index.insert(first);

        self.base = base_addr;
        self.end = sentinel_addr;
        self.sentinel = sentinel;
        self.index = index;
        self.initialized = true;
        log::debug!("heap initialized: base={base_addr:#x} end={sentinel_addr:#x} free={first_payload}");
        Ok(())
    }

    /// Round `n` up the way this variant's `malloc` would (spec.md's
    /// `heap_align`).
    #[must_use]
    pub fn heap_align(&self, n: usize) -> usize {
        round_up(n, I::MIN_BLOCK_SIZE)
    }

    /// Request `n` bytes. `None`/null per spec.md §7 covers `n == 0`, `n`
    /// exceeding [`MAX_REQUEST`], and genuine exhaustion alike — every
    /// failure here leaves the heap unchanged.
    #[must_use]
    pub fn malloc(&mut self, n: usize) -> *mut u8 {
        if n == 0 || n > MAX_REQUEST {
            log::trace!("malloc rejected: n={n}");
            return ptr::null_mut();
        }
        let need = self.heap_align(n);
        let Some(block) = self.index.best_fit_pop(need) else {
            log::debug!("malloc: out of memory for {need} bytes");
            return ptr::null_mut();
        };
        self.finish_allocation(block, need);
        log::trace!("malloc: {n} bytes -> {:#x}", block.client_space() as usize);
        block.client_space()
    }

    /// Split `block` (already popped from the index) if the remainder is
    /// large enough to stand alone, then mark the (possibly shrunk) head as
    /// allocated and fix up the right neighbor's left-alloc mirror bit
    /// (spec.md 4.E `malloc`'s split step).
    fn finish_allocation(&mut self, block: BlockPtr, need: usize) {
        let total = block.size();
        if total >= need + WORD + I::MIN_BLOCK_SIZE {
            let tail_payload = total - need - WORD;
            block.init_header(need, true, block.left_alloc());
            let tail = unsafe { BlockPtr::from_addr(block.addr() + WORD + need) };
            tail.init_header(tail_payload, false, true);
            tail.write_footer();
            self.index.insert(tail);
            log::trace!("split: {need} + {tail_payload} (+header)");
        } else {
            block.init_header(total, true, block.left_alloc());
            block.right_neighbor().set_left_alloc();
        }
    }

    /// Free `p`. `null` is a no-op (spec.md §7). Coalesces with free
    /// neighbors via [`crate::coalesce`] before re-inserting into the index.
    pub fn free(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }
        let block = unsafe { BlockPtr::from_client_ptr(p) };
        let fused = coalesce(&mut self.index, block);
        fused.write_footer();
        self.index.insert(fused);
        log::trace!("free: {:#x} -> fused block of {} bytes", p as usize, fused.size());
    }

    /// `realloc(p, n)`: `p == null` behaves as `malloc(n)`; `n == 0` with a
    /// non-null `p` behaves as `free(p)`. Otherwise attempts an in-place
    /// coalesce-and-grow before falling back to a fresh allocation plus
    /// copy (spec.md 4.E). Never moves or mutates client data on a path
    /// that returns null.
    ///
    /// # Safety
    /// `p` must be null or a pointer this heap previously returned and that
    /// has not since been freed.
    #[must_use]
    pub unsafe fn realloc(&mut self, p: *mut u8, n: usize) -> *mut u8 {
        if p.is_null() {
            return self.malloc(n);
        }
        if n == 0 {
            self.free(p);
            return ptr::null_mut();
        }
        if n > MAX_REQUEST {
            return ptr::null_mut();
        }

        let need = self.heap_align(n);
        let block = unsafe { BlockPtr::from_client_ptr(p) };
        let old_payload = block.size();

        // R3: already fits, return the same pointer untouched.
        if need <= old_payload {
            return p;
        }

        let fused = coalesce(&mut self.index, block);
        if fused.size() >= need {
            if fused.addr() != block.addr() {
                // Left-coalescing moved the block; the client bytes are
                // still physically where they were (coalescing never
                // writes past a block's own header/footer), just no longer
                // where the client expects them addressed from.
                unsafe {
                    ptr::copy(block.client_space(), fused.client_space(), old_payload);
                }
            }
            self.finish_allocation(fused, need);
            log::trace!("realloc: in-place grow to {need} bytes");
            return fused.client_space();
        }

        // Can't grow in place: give the fused block back to the index and
        // fall back to a fresh allocation.
        fused.write_footer();
        self.index.insert(fused);
        let new_ptr = self.malloc(n);
        if new_ptr.is_null() {
            return ptr::null_mut();
        }
        unsafe {
            ptr::copy(block.client_space(), new_ptr, old_payload);
        }
        log::trace!("realloc: fresh allocation of {need} bytes, copied {old_payload} bytes");
        new_ptr
    }

    /// Structural + quantitative self-check (component F, spec.md 4.F).
    #[must_use]
    pub fn validate(&self) -> bool {
        crate::validate::validate(self).is_ok()
    }

    /// Same as [`Self::validate`] but explains the first broken invariant.
    pub fn validate_checked(&self) -> Result<(), HeapError> {
        crate::validate::validate(self)
    }

    /// Linear walk of the segment summing free payload sizes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.iter_blocks().filter(|b| !b.is_alloc()).map(BlockPtr::size).sum()
    }

    /// Count of free-block index entries (representatives plus duplicates).
    #[must_use]
    pub fn get_free_total(&self) -> usize {
        self.index.free_entry_count()
    }

    /// A cheap structural summary beyond the bare byte/entry counts spec.md
    /// names directly: see `SPEC_FULL.md` §11.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut free_bytes = 0usize;
        let mut free_blocks = 0usize;
        let mut largest_free = 0usize;
        let mut total_bytes = 0usize;
        for b in self.iter_blocks() {
            total_bytes += WORD + b.size();
            if !b.is_alloc() {
                free_bytes += b.size();
                free_blocks += 1;
                largest_free = largest_free.max(b.size());
            }
        }
        HeapStats {
            total_bytes,
            free_bytes,
            free_blocks,
            largest_free_block: largest_free,
            fragmentation: if free_bytes == 0 {
                0.0
            } else {
                1.0 - (largest_free as f64 / free_bytes as f64)
            },
        }
    }

    /// Walk the segment, filling `actual` per spec.md's heap-diff contract.
    pub fn heap_diff(&self, expected: &[crate::diff::ExpectedBlock], actual: &mut [crate::diff::ActualBlock]) {
        crate::diff::heap_diff(self, expected, actual);
    }

    /// Textual rendering of the whole segment (component H).
    pub fn dump_heap(&self, w: &mut dyn core::fmt::Write) -> core::fmt::Result {
        crate::print::dump_heap(self, w)
    }

    /// Textual rendering of the free-block index (component H).
    pub fn print_free_nodes(&self, w: &mut dyn core::fmt::Write, style: crate::print::Style) -> core::fmt::Result {
        crate::print::print_free_nodes(&self.index, w, style)
    }

    /// Read-only iterator over every block in the segment, base to the end
    /// sentinel exclusive. Used internally by `validate`/`diff`/`dump`/
    /// `capacity`/`stats`, and exposed since it carries no safety
    /// requirements beyond `&self`.
    #[must_use]
    pub fn iter_blocks(&self) -> BlockIter {
        BlockIter {
            cur: if self.initialized { unsafe { BlockPtr::from_addr(self.base) } } else { self.sentinel },
            sentinel: self.sentinel,
        }
    }

    pub(crate) fn base(&self) -> usize {
        self.base
    }

    pub(crate) fn end(&self) -> usize {
        self.end
    }

    pub(crate) fn sentinel(&self) -> BlockPtr {
        self.sentinel
    }

    pub(crate) fn index(&self) -> &I {
        &self.index
    }
}

/// A cheap structural summary of the heap's current fragmentation, built
/// from the same walk [`Heap::capacity`] already performs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapStats {
    /// Total segment size, header words included.
    pub total_bytes: usize,
    pub free_bytes: usize,
    pub free_blocks: usize,
    pub largest_free_block: usize,
    /// `1 - largest_free_block / free_bytes`; `0.0` when nothing is free or
    /// everything free sits in one block.
    pub fragmentation: f64,
}

/// Iterator over every block header in segment order, produced by
/// [`Heap::iter_blocks`]. Never yields the end sentinel.
pub struct BlockIter {
    cur: BlockPtr,
    sentinel: BlockPtr,
}

impl Iterator for BlockIter {
    type Item = BlockPtr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == self.sentinel {
            return None;
        }
        let current = self.cur;
        self.cur = current.right_neighbor();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::seglist::SegList;

    fn new_segment(bytes: usize) -> Vec<u8> {
        vec![0u8; bytes]
    }

    #[test]
    fn init_rejects_too_small_segment() {
        let mut seg = new_segment(8);
        let mut heap = Heap::<SegList>::new();
        let ok = unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        assert!(!ok);
    }

    #[test]
    fn scenario_s1_init_capacity_and_free_total() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        assert!(unsafe { heap.init(seg.as_mut_ptr(), seg.len()) });
        assert_eq!(heap.capacity(), 1008);
        assert_eq!(heap.get_free_total(), 1);
        assert!(heap.validate());
    }

    #[test]
    fn scenario_s2_malloc_splits_remainder() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let p1 = heap.malloc(40);
        assert!(!p1.is_null());
        assert_eq!(heap.get_free_total(), 1);
        assert!(heap.validate());
    }

    #[test]
    fn scenario_s3_full_coalesce_after_freeing_both_neighbors() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let p1 = heap.malloc(40);
        let p2 = heap.malloc(40);
        heap.free(p1);
        heap.free(p2);
        assert_eq!(heap.capacity(), 1008);
        assert_eq!(heap.get_free_total(), 1);
        assert!(heap.validate());
    }

    #[test]
    fn scenario_s4_realloc_grows_in_place_and_preserves_data() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let p = heap.malloc(100);
        unsafe {
            ptr::write_bytes(p, 0xAB, 100);
        }
        let q = unsafe { heap.realloc(p, 200) };
        assert_eq!(q, p);
        let bytes = unsafe { core::slice::from_raw_parts(q, 100) };
        assert!(bytes.iter().all(|&b| b == 0xAB));
        assert!(heap.validate());
    }

    #[test]
    fn realloc_null_behaves_as_malloc() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let p = unsafe { heap.realloc(ptr::null_mut(), 64) };
        assert!(!p.is_null());
        assert!(heap.validate());
    }

    #[test]
    fn realloc_zero_behaves_as_free() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let p = heap.malloc(64);
        let r = unsafe { heap.realloc(p, 0) };
        assert!(r.is_null());
        assert_eq!(heap.capacity(), 1008);
    }

    #[test]
    fn malloc_zero_and_oversized_are_rejected_in_band() {
        let mut seg = new_segment(1024);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        assert!(heap.malloc(0).is_null());
        assert!(heap.malloc(MAX_REQUEST + 1).is_null());
        assert_eq!(heap.capacity(), 1008);
    }

    #[test]
    fn scenario_s6_exhaustion_then_recovery() {
        let mut seg = new_segment(256);
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let mut live = vec![];
        loop {
            let p = heap.malloc(24);
            if p.is_null() {
                break;
            }
            live.push(p);
        }
        assert!(heap.malloc(24).is_null());
        assert!(heap.validate());
        let freed = live.pop().unwrap();
        heap.free(freed);
        assert!(!heap.malloc(24).is_null());
    }
}
