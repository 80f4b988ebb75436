//! 4.C.2 — red-black tree variants.
//!
//! All four variants here are semantically identical red-black trees
//! keyed by free-block size; they differ only in how they track the path
//! from root to the node being operated on (spec.md 4.C.2):
//!
//! - [`clrs`]: a persistent parent pointer per node, fixups written out
//!   the way Cormen, Leiserson, Rivest & Stein present them.
//! - [`unified`]: the same persistent parent pointer, but left/right
//!   collapsed into a [`super::Dir`] index so each fixup case is written
//!   once instead of twice.
//! - [`stacked`]: no parent field at all — an explicit, bounded ancestor
//!   stack built during descent stands in for it.
//! - [`topdown`]: fixups applied *during* descent (Julienne-Walker style)
//!   so each operation is a single top-to-bottom pass.

pub mod clrs;
pub mod stacked;
pub mod topdown;
pub mod unified;

use crate::block::{BlockPtr, Color};
use crate::index::node::Node;

/// Two independently-computed black-heights must agree and be nonzero,
/// and no red node may have a red child (spec.md P8). Run as two
/// differently-shaped traversals — a recursive post-order accumulate and
/// an iterative leftmost-path baseline checked by a second DFS — so a bug
/// in one traversal style doesn't silently cancel a bug in the other.
pub(crate) fn check_red_black_heights(root: BlockPtr, sentinel: BlockPtr) -> Result<usize, &'static str> {
    let by_recursion = black_height_recursive(root, sentinel)?;
    let by_leftmost_baseline = black_height_against_leftmost_path(root, sentinel)?;
    if by_recursion != by_leftmost_baseline {
        return Err("the two black-height computations disagree");
    }
    if by_recursion == 0 {
        return Err("black-height must be nonzero for a nonempty tree");
    }
    Ok(by_recursion)
}

fn black_height_recursive(n: BlockPtr, sentinel: BlockPtr) -> Result<usize, &'static str> {
    if n == sentinel {
        return Ok(1); // nil counts as black, contributing one black level
    }
    let node = Node::new(n);
    if n.color() == Color::Red {
        let l = node.left();
        let r = node.right();
        if (l != sentinel && l.color() == Color::Red) || (r != sentinel && r.color() == Color::Red)
        {
            return Err("red node with a red child");
        }
    }
    let lh = black_height_recursive(node.left(), sentinel)?;
    let rh = black_height_recursive(node.right(), sentinel)?;
    if lh != rh {
        return Err("black-height mismatch between a node's subtrees");
    }
    Ok(lh + usize::from(n.color() == Color::Black))
}

fn black_height_against_leftmost_path(root: BlockPtr, sentinel: BlockPtr) -> Result<usize, &'static str> {
    let mut expected = 1usize; // account for the nil leaf
    let mut cur = root;
    while cur != sentinel {
        if cur.color() == Color::Black {
            expected += 1;
        }
        cur = Node::new(cur).left();
    }

    fn verify(n: BlockPtr, sentinel: BlockPtr, acc: usize, expected: usize) -> Result<(), &'static str> {
        if n == sentinel {
            return if acc + 1 == expected {
                Ok(())
            } else {
                Err("black-height mismatch against the leftmost-path baseline")
            };
        }
        let node = Node::new(n);
        let acc = acc + usize::from(n.color() == Color::Black);
        verify(node.left(), sentinel, acc, expected)?;
        verify(node.right(), sentinel, acc, expected)
    }
    verify(root, sentinel, 0, expected)?;
    Ok(expected)
}

/// Minimum-size node in `n`'s subtree, per the textbook `TREE-MINIMUM`
/// (used by both the CLRS-style and unified-symmetry successor search).
pub(crate) fn subtree_min(mut n: BlockPtr, sentinel: BlockPtr) -> BlockPtr {
    loop {
        let left = Node::new(n).left();
        if left == sentinel {
            return n;
        }
        n = left;
    }
}
