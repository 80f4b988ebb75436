//! Duplicate side list (component D): spec.md 4.D.
//!
//! Every C.2/C.3 variant stores at most one tree node per distinct size.
//! Additional free blocks of that size hang off the representative as a
//! doubly linked list threaded through the same [`Node`](crate::index::node::Node)
//! slots. All operations here are O(1) except [`promote_head`], which is
//! O(1) too but does more bookkeeping: it's what lets a tree deletion skip
//! a full rebalance whenever the node being removed has a stand-in ready.

use crate::block::BlockPtr;
use crate::index::node::Node;

/// Insert `new_dup` as the new head of `rep`'s duplicate list.
///
/// `current_parent` is whatever the caller currently considers to be
/// `rep`'s tree parent (a persistent field for CLRS/unified, or the top of
/// the descent stack for the parent-less variants). It is stashed in the
/// new head's aux slot per spec.md 4.D so a later removal of `rep` can
/// promote this duplicate without re-searching the tree.
pub fn push_duplicate(rep: Node, new_dup: Node, sentinel: BlockPtr, current_parent: BlockPtr) {
    let old_head = rep.list_start();
    new_dup.set_prev_dup(sentinel);
    new_dup.set_next_dup(old_head);
    new_dup.set_aux_parent(current_parent);
    if old_head != sentinel {
        Node::new(old_head).set_prev_dup(new_dup.block());
    }
    rep.set_list_start(new_dup.block());
}

/// Does `rep` have at least one duplicate hanging off it?
#[must_use]
pub fn has_duplicates(rep: Node, sentinel: BlockPtr) -> bool {
    rep.list_start() != sentinel
}

/// Pop and return an arbitrary duplicate of `rep` in O(1) (the head), for
/// the "best-fit found a representative with a non-empty side list" case
/// in spec.md 4.C.2 — the tree itself is left untouched.
#[must_use]
pub fn pop_arbitrary(rep: Node, sentinel: BlockPtr) -> Option<BlockPtr> {
    let head = rep.list_start();
    if head == sentinel {
        return None;
    }
    splice_out(Node::new(head), rep, sentinel);
    Some(head)
}

/// Remove a specific, known-present duplicate `dup` from `rep`'s list in
/// O(1), used by `remove_by_address` when the coalescer hands back a block
/// that turns out to be a duplicate rather than the representative.
pub fn splice_out(dup: Node, rep: Node, sentinel: BlockPtr) {
    let prev = dup.prev_dup();
    let next = dup.next_dup();
    if rep.list_start() == dup.block() {
        // Removing the head: the new head inherits the aux parent we were
        // carrying, since it still describes the same representative.
        rep.set_list_start(next);
        if next != sentinel {
            let next_node = Node::new(next);
            next_node.set_prev_dup(sentinel);
            next_node.set_aux_parent(dup.aux_parent());
        }
    } else {
        Node::new(prev).set_next_dup(next);
        if next != sentinel {
            Node::new(next).set_prev_dup(prev);
        }
    }
}

/// When a representative with a non-empty side list is deleted from the
/// tree outright, promote its head duplicate into the representative's
/// tree position: copy children and color, hand the remaining duplicates
/// to the promoted node, and return it along with the parent stashed in
/// its aux slot so the caller can relink whatever pointed at the old
/// representative (parent's child slot, the stack slot of an ancestor, or
/// the tree root) to `promoted.block()`. The aux slot is read here, before
/// `set_list_start` below overwrites it — both fields are the same
/// physical word (`Node::list_start`/`Node::aux_parent`), so a caller
/// reading `promoted.aux_parent()` after this returns would get the
/// duplicate-list head, not the stored parent.
#[must_use]
pub fn promote_head(rep: Node, sentinel: BlockPtr) -> Option<(Node, BlockPtr)> {
    let head_block = rep.list_start();
    if head_block == sentinel {
        return None;
    }
    let head = Node::new(head_block);
    let parent = head.aux_parent();
    let remaining = head.next_dup();
    if remaining != sentinel {
        Node::new(remaining).set_prev_dup(sentinel);
    }
    head.set_left(rep.left());
    head.set_right(rep.right());
    head.set_list_start(remaining);
    head.block().set_color(rep.block().color());
    Some((head, parent))
}
