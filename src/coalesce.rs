//! Component B: the coalescer (spec.md 4.B).
//!
//! Fuses a just-freed block with whichever of its left/right neighbors
//! are themselves free, extracting any fused neighbor from the index
//! first. Runs in the two cases described in spec.md 4.B: right-merge is
//! unconditional (checked via the neighbor's own header), left-merge is
//! gated on this block's left-free bit so it never has to guess at the
//! validity of reading a footer.

use crate::block::BlockPtr;
use crate::index::FreeIndex;

/// Fuse `block` with its free left and/or right neighbors, removing any
/// fused neighbor from `index` along the way.
///
/// Per spec.md 4.B step 3, the caller decides whether to (re-)write the
/// fused block's footer: `free` always does (the block is being handed
/// back to the index), while `realloc`'s in-place-grow path defers it
/// until it knows whether the grown block will end up allocated or
/// split, since footers only make sense on a block that is free when it
/// returns from here.
///
/// Returns the block that now represents the fused region — this is
/// `block` itself unless the left neighbor merged in, in which case it is
/// the left neighbor's address.
pub fn coalesce<I: FreeIndex>(index: &mut I, mut block: BlockPtr) -> BlockPtr {
    let mut size = block.size();

    let right = block.right_neighbor();
    if !right.is_alloc() {
        index.remove_by_address(right);
        size += crate::block::WORD + right.size();
    }

    if let Some(left) = block.left_neighbor() {
        index.remove_by_address(left);
        size = left.size() + crate::block::WORD + size;
        block = left;
    }

    block.init_header(size, false, block.left_alloc());
    block.right_neighbor().set_left_free();
    block
}
