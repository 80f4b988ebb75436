//! 4.C.3 — splay tree variants.
//!
//! Both variants key on free-block size exactly like the red-black
//! variants in [`super::rbtree`] and share the same duplicate-side-list
//! trick (spec.md 4.D) for O(1) coalescing, but get their amortised O(log
//! N) bound from rotating the accessed node to the root instead of
//! maintaining a color invariant — so neither carries a color bit
//! (`HAS_COLOR = false`) and best-fit has to work around the fact that a
//! splay only ever targets an *exact* key:
//!
//! - [`bottomup`]: descends with an explicit [`super::AncestorStack`]
//!   (same stack type the stacked/top-down red-black variants use), then
//!   climbs back up applying zig/zig-zig/zig-zag rotations.
//! - [`topdown`]: Sleator's single-pass algorithm, assembling left/right
//!   "wings" as it descends instead of unwinding a stack afterwards.

pub mod bottomup;
pub mod topdown;
