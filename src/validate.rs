//! Component F: the validator (spec.md 4.F).
//!
//! Composes the segment walker's own view of the heap with the index's
//! `validate_structure` to check every invariant I1-I6/P1-P9 in one pass.
//! `Heap::validate` collapses this into a bare `bool`; `validate_checked`
//! (and this module's `validate` function) keep the broken-invariant string
//! around for debug builds, matching spec.md §7's "instrumentation trap"
//! description of `CorruptHeap`.

use crate::block::{Color, WORD};
use crate::error::HeapError;
use crate::heap::Heap;
use crate::index::FreeIndex;

/// Run every structural and quantitative check spec.md 4.F names. Returns
/// the first broken invariant, if any.
pub fn validate<I: FreeIndex>(heap: &Heap<I>) -> Result<(), HeapError> {
    check_segment_closure(heap)?;
    check_left_bits_and_footers(heap)?;
    check_index_balance(heap)?;
    heap.index()
        .validate_structure()
        .map_err(HeapError::CorruptHeap)?;
    Ok(())
}

/// I5: walking headers left-to-right from the base reaches the end
/// sentinel at exactly `heap.end()`, and never overshoots it.
fn check_segment_closure<I: FreeIndex>(heap: &Heap<I>) -> Result<(), HeapError> {
    let mut addr = heap.base();
    loop {
        if addr > heap.end() {
            return Err(HeapError::CorruptHeap("segment walk overshot the end sentinel"));
        }
        let block = unsafe { crate::block::BlockPtr::from_addr(addr) };
        if block.size() == 0 {
            if addr != heap.end() {
                return Err(HeapError::CorruptHeap("bad jump: zero-size header before the end sentinel"));
            }
            return Ok(());
        }
        addr += WORD + block.size();
    }
}

/// I2, I3, I4: footer mirrors, no two adjacent free blocks, and the
/// left-alloc mirror bit on every non-first block.
fn check_left_bits_and_footers<I: FreeIndex>(heap: &Heap<I>) -> Result<(), HeapError> {
    let mut prev: Option<crate::block::BlockPtr> = None;
    for block in heap.iter_blocks() {
        if !block.is_alloc() {
            let header = unsafe { block_header_word(block) };
            let footer = unsafe { block_footer_word(block) };
            if header != footer {
                return Err(HeapError::CorruptHeap("free block's footer disagrees with its header"));
            }
        }
        if let Some(p) = prev {
            let expected_left_alloc = p.is_alloc();
            if block.left_alloc() != expected_left_alloc {
                return Err(HeapError::CorruptHeap("left-alloc mirror bit disagrees with the left neighbor"));
            }
            if !p.is_alloc() && !block.is_alloc() {
                return Err(HeapError::CorruptHeap("two adjacent free blocks survived coalescing"));
            }
        }
        prev = Some(block);
    }
    Ok(())
}

unsafe fn block_header_word(block: crate::block::BlockPtr) -> (usize, bool) {
    (block.size(), block.color() == Color::Red)
}

unsafe fn block_footer_word(block: crate::block::BlockPtr) -> (usize, bool) {
    // The footer is a byte-for-byte copy of the header word (I2); reading it
    // as a synthetic block at the footer address recovers the same pair.
    let footer_block = unsafe { crate::block::BlockPtr::from_addr(block.footer_ptr() as usize) };
    (footer_block.size(), footer_block.color() == Color::Red)
}

/// I6/P6: the index's own totals agree with what the segment walker
/// independently counts.
fn check_index_balance<I: FreeIndex>(heap: &Heap<I>) -> Result<(), HeapError> {
    let mut walker_count = 0usize;
    let mut walker_bytes = 0usize;
    for block in heap.iter_blocks() {
        if !block.is_alloc() {
            walker_count += 1;
            walker_bytes += block.size();
        }
    }
    let index_count = heap.index().free_entry_count();
    let index_bytes = heap.index().total_free_bytes();
    if walker_count != index_count {
        return Err(HeapError::CorruptHeap("index entry count disagrees with the segment walk"));
    }
    if walker_bytes != index_bytes {
        return Err(HeapError::CorruptHeap("index byte total disagrees with the segment walk"));
    }
    Ok(())
}
