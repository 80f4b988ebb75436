//! Per-variant constants and the handful of knobs spec.md leaves to the
//! implementation.
//!
//! spec.md §9 notes two genuinely ambiguous points in the source behavior
//! this crate was distilled from:
//!
//! 1. Whether the segregated list's final bucket represents "infinity" or
//!    a literal 65,535-byte threshold.
//! 2. Whether the end sentinel should be reinitialized to an all-zero word
//!    or to "allocated bit only" after a size-0 read.
//!
//! Both are resolved here rather than left floating; see DESIGN.md for the
//! reasoning.

use crate::block::ALIGN;

/// Byte count above which `malloc` rejects a request outright
/// (`HeapError`/null per spec.md §7's `InvalidRequest`). spec.md leaves the
/// exact cap implementation-defined; one eighth of the address space is
/// generous for any segment this crate can realistically be handed.
pub const MAX_REQUEST: usize = 1 << 40;

/// Number of exact-size buckets at the bottom of the segregated list
/// (spec.md 4.C.1): `min_block`, `min_block + ALIGN`, ..., `min_block + 6 *
/// ALIGN`.
pub const EXACT_BUCKETS: usize = 7;

/// Total bucket count for the segregated list variant, exact-size buckets
/// included. The last bucket is the catch-all described in spec.md 4.C.1.
pub const SEGLIST_BUCKETS: usize = 32;

const fn floor_log2(n: usize) -> u32 {
    63 - (n as u64).leading_zeros()
}

/// Map a payload size to its segregated-list bucket index.
///
/// Resolves the Open Question from spec.md §9: the catch-all bucket is
/// reached by clamping the power-of-two bucket index, so it absorbs every
/// size whose `floor(log2)` would otherwise exceed the table — in
/// particular everything at or above 65,536 bytes, matching the "above
/// 65,535" wording literally rather than treating it as an unbounded
/// infinity. With the `literal-bucket-cap` feature enabled, [`crate::print`]
/// additionally renders that bucket's upper edge as the literal
/// `u16::MAX` instead of `+inf`.
#[must_use]
pub fn seglist_bucket(size: usize, min_block: usize) -> usize {
    debug_assert!(size >= min_block);
    for i in 0..EXACT_BUCKETS {
        if size == min_block + i * ALIGN {
            return i;
        }
    }
    let base_k = floor_log2(min_block + (EXACT_BUCKETS - 1) * ALIGN);
    let k = floor_log2(size).max(base_k + 1);
    let idx = EXACT_BUCKETS + (k - base_k - 1) as usize;
    idx.min(SEGLIST_BUCKETS - 1)
}

/// Header word a freshly-initialized end sentinel carries.
///
/// spec.md §9 notes the source is inconsistent between a bare `1`
/// (allocated bit only) and `0`, and that the walker only relies on
/// `size == 0` to terminate, so either works. This crate standardizes on
/// `1`: an end sentinel always reads as allocated, which keeps
/// [`crate::validate`] from having to special-case it when it scans for
/// "no adjacent free blocks."
pub const SENTINEL_ALLOC_BIT: bool = true;
