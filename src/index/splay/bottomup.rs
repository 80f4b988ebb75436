//! Bottom-up splay tree: a normal BST descent records the root-to-target
//! path in an [`AncestorStack`], then the target is walked back up to the
//! root applying zig (single rotation against the root), zig-zig (two
//! rotations in the same direction), or zig-zag (two rotations in
//! opposite directions) at each step (spec.md 4.C.3).
//!
//! Deletion splays the target to the root, detaches it, and joins its two
//! children by splaying the left subtree's maximum to its own root and
//! hanging the right subtree off that node's right child — the
//! split/join shape spec.md 4.C.3 describes, built here out of the same
//! splay primitive used for access.

use crate::block::BlockPtr;
use crate::duplist;
use crate::index::node::Node;
use crate::index::{check_bst_property, check_duplicate_chain, AncestorStack, Dir, FreeIndex};

fn child(n: BlockPtr, dir: Dir) -> BlockPtr {
    match dir {
        Dir::Left => Node::new(n).left(),
        Dir::Right => Node::new(n).right(),
    }
}

fn set_child(n: BlockPtr, dir: Dir, v: BlockPtr) {
    match dir {
        Dir::Left => Node::new(n).set_left(v),
        Dir::Right => Node::new(n).set_right(v),
    }
}

/// Promote `child(parent, dir)` to stand where `parent` used to, relinking
/// whatever `parent` was attached to (`relink`, or the caller's subtree
/// root if `None`). Returns the new top of this local subtree.
fn rotate_child_up(parent: BlockPtr, dir: Dir, relink: Option<(BlockPtr, Dir)>) -> BlockPtr {
    let new_top = child(parent, dir);
    let inner = child(new_top, dir.opposite());
    set_child(parent, dir, inner);
    set_child(new_top, dir.opposite(), parent);
    if let Some((anc, adir)) = relink {
        set_child(anc, adir, new_top);
    }
    new_top
}

/// Walk `stack` (root-to-parent-of-target path) back up, splaying the
/// implied target to the top of whatever subtree `stack`'s bottom entry
/// was taken from. Returns the new subtree root, or `None` if the stack
/// was empty (target was already the root of its subtree).
fn splay(stack: &mut AncestorStack) -> Option<BlockPtr> {
    let mut new_top = None;
    loop {
        let Some((p, dir1)) = stack.pop() else { break };
        new_top = Some(match stack.pop() {
            None => rotate_child_up(p, dir1, None),
            Some((g, dir2)) => {
                let great_grandparent = stack.peek();
                if dir1 == dir2 {
                    let mid = rotate_child_up(g, dir2, great_grandparent);
                    rotate_child_up(mid, dir1, great_grandparent)
                } else {
                    let mid = rotate_child_up(p, dir1, Some((g, dir2)));
                    rotate_child_up(g, dir2, great_grandparent)
                }
            }
        });
    }
    new_top
}

pub struct BottomUp {
    root: BlockPtr,
    sentinel: BlockPtr,
    rep_count: usize,
    dup_count: usize,
}

impl Default for BottomUp {
    fn default() -> Self {
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self { root: nil, sentinel: nil, rep_count: 0, dup_count: 0 }
    }
}

impl BottomUp {
    fn find_best(&self, k: usize) -> BlockPtr {
        let nil = self.sentinel;
        let mut cur = self.root;
        let mut best = nil;
        while cur != nil {
            let sz = cur.size();
            if sz == k {
                return cur;
            }
            if sz > k {
                best = cur;
                cur = Node::new(cur).left();
            } else {
                cur = Node::new(cur).right();
            }
        }
        best
    }

    fn find_exact_with_stack(&self, size: usize, stack: &mut AncestorStack) -> BlockPtr {
        let nil = self.sentinel;
        let mut cur = self.root;
        while cur != nil {
            let sz = cur.size();
            if sz == size {
                return cur;
            }
            let dir = if size < sz { Dir::Left } else { Dir::Right };
            stack.push(cur, dir);
            cur = child(cur, dir);
        }
        nil
    }

    /// Splay the subtree rooted at `sub` to surface its maximum, used by
    /// [`Self::remove_representative`] to join the two halves left after
    /// the representative itself is detached.
    fn splay_max(sub: BlockPtr, sentinel: BlockPtr) -> BlockPtr {
        if sub == sentinel {
            return sub;
        }
        let mut stack = AncestorStack::new();
        let mut cur = sub;
        while child(cur, Dir::Right) != sentinel {
            stack.push(cur, Dir::Right);
            cur = child(cur, Dir::Right);
        }
        splay(&mut stack).unwrap_or(sub)
    }

    /// Splay `rep` to the root, detach it, and join its children.
    fn remove_representative(&mut self, rep: BlockPtr) {
        let nil = self.sentinel;
        let mut stack = AncestorStack::new();
        let found = self.find_exact_with_stack(rep.size(), &mut stack);
        debug_assert_eq!(found, rep, "representative must still be where find_best left it");
        if let Some(new_root) = splay(&mut stack) {
            self.root = new_root;
        }
        let left = Node::new(rep).left();
        let right = Node::new(rep).right();
        self.root = if left == nil {
            right
        } else {
            let new_left_root = Self::splay_max(left, nil);
            set_child(new_left_root, Dir::Right, right);
            new_left_root
        };
        self.rep_count -= 1;
    }
}

impl FreeIndex for BottomUp {
    // header + left + right + list_start + footer: no parent, no color.
    const MIN_BLOCK_SIZE: usize = 5 * crate::block::WORD;
    const HAS_COLOR: bool = false;
    const NAME: &'static str = "splay-bottomup";

    fn set_sentinel(&mut self, sentinel: BlockPtr) {
        self.sentinel = sentinel;
        self.root = sentinel;
    }

    fn insert(&mut self, block: BlockPtr) {
        let nil = self.sentinel;
        let node = Node::new(block);
        let size = block.size();
        if self.root == nil {
            node.set_left(nil);
            node.set_right(nil);
            node.set_list_start(nil);
            self.root = block;
            self.rep_count += 1;
            return;
        }
        let mut stack = AncestorStack::new();
        let mut cur = self.root;
        loop {
            let cs = cur.size();
            if size == cs {
                let current_parent = stack.peek().map_or(nil, |(p, _)| p);
                duplist::push_duplicate(Node::new(cur), node, nil, current_parent);
                self.dup_count += 1;
                if let Some(new_root) = splay(&mut stack) {
                    self.root = new_root;
                }
                return;
            }
            let dir = if size < cs { Dir::Left } else { Dir::Right };
            let next = child(cur, dir);
            if next == nil {
                node.set_left(nil);
                node.set_right(nil);
                node.set_list_start(nil);
                set_child(cur, dir, block);
                stack.push(cur, dir);
                self.rep_count += 1;
                if let Some(new_root) = splay(&mut stack) {
                    self.root = new_root;
                }
                return;
            }
            stack.push(cur, dir);
            cur = next;
        }
    }

    fn best_fit_pop(&mut self, k: usize) -> Option<BlockPtr> {
        let rep = self.find_best(k);
        if rep == self.sentinel {
            return None;
        }
        if let Some(dup) = duplist::pop_arbitrary(Node::new(rep), self.sentinel) {
            self.dup_count -= 1;
            let mut stack = AncestorStack::new();
            let found = self.find_exact_with_stack(rep.size(), &mut stack);
            debug_assert_eq!(found, rep);
            if let Some(new_root) = splay(&mut stack) {
                self.root = new_root;
            }
            return Some(dup);
        }
        self.remove_representative(rep);
        Some(rep)
    }

    fn remove_by_address(&mut self, block: BlockPtr) {
        let mut stack = AncestorStack::new();
        let rep = self.find_exact_with_stack(block.size(), &mut stack);
        debug_assert!(rep != self.sentinel, "block claims to be indexed but its size isn't in the tree");
        if rep == block {
            if let Some((promoted, _)) = duplist::promote_head(Node::new(rep), self.sentinel) {
                match stack.peek() {
                    Some((p, dir)) => set_child(p, dir, promoted.block()),
                    None => self.root = promoted.block(),
                }
                self.dup_count -= 1;
            } else {
                self.remove_representative(rep);
            }
        } else {
            duplist::splice_out(Node::new(block), Node::new(rep), self.sentinel);
            self.dup_count -= 1;
        }
    }

    fn free_entry_count(&self) -> usize {
        self.rep_count + self.dup_count
    }

    fn validate_structure(&self) -> Result<(), &'static str> {
        check_bst_property(self.root, self.sentinel)?;
        check_duplicate_chain(self.root, self.sentinel)
    }

    fn total_free_bytes(&self) -> usize {
        crate::index::sum_tree_sizes(self.root, self.sentinel)
    }

    fn dump(&self, w: &mut dyn core::fmt::Write, verbose: bool) -> core::fmt::Result {
        crate::index::dump_tree_inorder(w, self.root, self.sentinel, verbose, Self::HAS_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc_zeroed, Layout};

    fn fresh_block(payload: usize) -> BlockPtr {
        unsafe {
            let layout = Layout::from_size_align(crate::block::WORD + payload + 8, 16).unwrap();
            let ptr = alloc_zeroed(layout);
            let block = BlockPtr::from_addr(ptr as usize);
            block.init_header(payload, false, true);
            block
        }
    }

    fn fresh_index() -> BottomUp {
        let mut idx = BottomUp::default();
        idx.set_sentinel(fresh_block(BottomUp::MIN_BLOCK_SIZE));
        idx
    }

    #[test]
    fn insert_splays_to_root() {
        let mut idx = fresh_index();
        let a = fresh_block(64);
        let b = fresh_block(128);
        idx.insert(a);
        idx.insert(b);
        assert_eq!(idx.root, b);
        idx.validate_structure().unwrap();
    }

    #[test]
    fn best_fit_picks_smallest_qualifying_size() {
        let mut idx = fresh_index();
        for s in [64usize, 128, 192, 256, 320, 384, 448, 512] {
            idx.insert(fresh_block(s));
        }
        idx.validate_structure().unwrap();
        let found = idx.best_fit_pop(200).unwrap();
        assert_eq!(found.size(), 256);
        idx.validate_structure().unwrap();
    }

    #[test]
    fn duplicate_chain_and_promotion() {
        let mut idx = fresh_index();
        let a = fresh_block(64);
        let b = fresh_block(64);
        let c = fresh_block(128);
        idx.insert(a);
        idx.insert(b);
        idx.insert(c);
        assert_eq!(idx.dup_count, 1);
        idx.remove_by_address(a);
        idx.validate_structure().unwrap();
        assert_eq!(idx.free_entry_count(), 2);
    }

    #[test]
    fn full_drain_in_descending_order_stays_a_valid_bst() {
        let mut idx = fresh_index();
        let mut blocks = vec![];
        for s in (1..=24).map(|i| i * 32) {
            let b = fresh_block(s);
            idx.insert(b);
            blocks.push(b);
            idx.validate_structure().unwrap();
        }
        for &b in blocks.iter().rev() {
            idx.remove_by_address(b);
            idx.validate_structure().unwrap();
        }
        assert_eq!(idx.free_entry_count(), 0);
    }

    #[test]
    fn split_join_after_two_child_removal() {
        let mut idx = fresh_index();
        let sizes = [256usize, 128, 384, 64, 192, 320, 448];
        for &s in &sizes {
            idx.insert(fresh_block(s));
        }
        idx.validate_structure().unwrap();
        let removed = idx.best_fit_pop(256).unwrap();
        assert_eq!(removed.size(), 256);
        idx.validate_structure().unwrap();
        assert_eq!(idx.free_entry_count(), sizes.len() - 1);
    }
}
