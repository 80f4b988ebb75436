//! Top-down splay tree (Sleator & Tarjan): each access is a single pass
//! from the root down to the target key, folding rotated-away subtrees
//! into two growing "wings" instead of unwinding a stack afterwards
//! (spec.md 4.C.3). The pass needs two assembly anchors to hang those
//! wings from; this borrows the segment's own sentinel block for the
//! duration of each call (spec.md §9's "sentinel-as-node" idiom: the
//! sentinel's fields may be freely scribbled over, and nothing else reads
//! them mid-call since the allocator isn't reentrant).
//!
//! Because the pass targets an exact key, best-fit has to remember the
//! smallest size `>=` the request seen along the way; if the splay
//! settles on something smaller than the request, a second pass re-splays
//! to that recorded size (spec.md 4.C.3's explicit callout for this
//! variant).

use crate::block::BlockPtr;
use crate::duplist;
use crate::index::node::Node;
use crate::index::{check_bst_property, check_duplicate_chain, FreeIndex};

fn child_left(n: BlockPtr) -> BlockPtr {
    Node::new(n).left()
}

fn child_right(n: BlockPtr) -> BlockPtr {
    Node::new(n).right()
}

/// Track the smallest node size `>= key` seen so far during a descent.
fn note_candidate(best: &mut Option<usize>, candidate: usize, key: usize) {
    if candidate >= key && best.is_none_or(|b| candidate < b) {
        *best = Some(candidate);
    }
}

/// Single-pass top-down splay of the subtree rooted at `t` toward `key`,
/// using `sentinel`'s own left/right fields as the left-wing/right-wing
/// assembly anchors. Returns the new subtree root and, if any node with
/// size `>= key` was visited, the smallest such size seen.
fn splay_sub(mut t: BlockPtr, sentinel: BlockPtr, key: usize) -> (BlockPtr, Option<usize>) {
    if t == sentinel {
        return (t, None);
    }
    let header = sentinel;
    Node::new(header).set_left(sentinel);
    Node::new(header).set_right(sentinel);
    let mut left_wing = header; // largest-so-far root of the "< key" wing
    let mut right_wing = header; // smallest-so-far root of the "> key" wing
    let mut best: Option<usize> = None;

    loop {
        let ts = t.size();
        note_candidate(&mut best, ts, key);
        if key < ts {
            let l = child_left(t);
            if l == sentinel {
                break;
            }
            if key < l.size() {
                note_candidate(&mut best, l.size(), key);
                Node::new(t).set_left(child_right(l));
                Node::new(l).set_right(t);
                t = l;
                if child_left(t) == sentinel {
                    break;
                }
            }
            Node::new(right_wing).set_left(t);
            right_wing = t;
            t = child_left(t);
        } else if key > ts {
            let r = child_right(t);
            if r == sentinel {
                break;
            }
            if key > r.size() {
                Node::new(t).set_right(child_left(r));
                Node::new(r).set_left(t);
                t = r;
                if child_right(t) == sentinel {
                    break;
                }
            }
            Node::new(left_wing).set_right(t);
            left_wing = t;
            t = child_right(t);
        } else {
            break;
        }
    }

    Node::new(left_wing).set_right(child_left(t));
    Node::new(right_wing).set_left(child_right(t));
    Node::new(t).set_left(child_right(header));
    Node::new(t).set_right(child_left(header));
    (t, best)
}

pub struct Topdown {
    root: BlockPtr,
    sentinel: BlockPtr,
    rep_count: usize,
    dup_count: usize,
}

impl Default for Topdown {
    fn default() -> Self {
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self { root: nil, sentinel: nil, rep_count: 0, dup_count: 0 }
    }
}

impl Topdown {
    fn splay(&mut self, key: usize) -> Option<usize> {
        let (new_root, best) = splay_sub(self.root, self.sentinel, key);
        self.root = new_root;
        best
    }

    /// Splay a detached subtree to surface its maximum; used to join the
    /// two halves left over after a representative at the root is cut
    /// loose. Every comparison in [`splay_sub`] descends right since no
    /// real block size reaches `usize::MAX`.
    fn splay_max(sub: BlockPtr, sentinel: BlockPtr) -> BlockPtr {
        if sub == sentinel {
            return sub;
        }
        splay_sub(sub, sentinel, usize::MAX).0
    }

    fn remove_root_representative(&mut self) {
        let nil = self.sentinel;
        let rep = self.root;
        let left = Node::new(rep).left();
        let right = Node::new(rep).right();
        self.root = if left == nil {
            right
        } else {
            let new_left_root = Self::splay_max(left, nil);
            Node::new(new_left_root).set_right(right);
            new_left_root
        };
        self.rep_count -= 1;
    }
}

impl FreeIndex for Topdown {
    // header + left + right + list_start + footer: no parent, no color.
    const MIN_BLOCK_SIZE: usize = 5 * crate::block::WORD;
    const HAS_COLOR: bool = false;
    const NAME: &'static str = "splay-topdown";

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
        self.splay(size);
        let root_size = self.root.size();
        if root_size == size {
            duplist::push_duplicate(Node::new(self.root), node, nil, nil);
            self.dup_count += 1;
            return;
        }
        node.set_list_start(nil);
        if size < root_size {
            node.set_left(child_left(self.root));
            node.set_right(self.root);
            Node::new(self.root).set_left(nil);
        } else {
            node.set_right(child_right(self.root));
            node.set_left(self.root);
            Node::new(self.root).set_right(nil);
        }
        self.root = block;
        self.rep_count += 1;
    }

    fn best_fit_pop(&mut self, k: usize) -> Option<BlockPtr> {
        if self.root == self.sentinel {
            return None;
        }
        let best = self.splay(k);
        if self.root.size() < k {
            match best {
                Some(b) => {
                    self.splay(b);
                }
                None => return None,
            }
        }
        if self.root.size() < k {
            return None;
        }
        let rep = self.root;
        if let Some(dup) = duplist::pop_arbitrary(Node::new(rep), self.sentinel) {
            self.dup_count -= 1;
            return Some(dup);
        }
        self.remove_root_representative();
        Some(rep)
    }

    fn remove_by_address(&mut self, block: BlockPtr) {
        let nil = self.sentinel;
        self.splay(block.size());
        let rep = self.root;
        debug_assert_eq!(rep.size(), block.size(), "block claims to be indexed but its size isn't in the tree");
        if rep == block {
            if let Some((promoted, _)) = duplist::promote_head(Node::new(rep), nil) {
                self.root = promoted.block();
                self.dup_count -= 1;
            } else {
                self.remove_root_representative();
            }
        } else {
            duplist::splice_out(Node::new(block), Node::new(rep), nil);
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

    fn fresh_index() -> Topdown {
        let mut idx = Topdown::default();
        idx.set_sentinel(fresh_block(Topdown::MIN_BLOCK_SIZE));
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
    fn best_fit_re_splays_when_descent_overshoots() {
        let mut idx = fresh_index();
        for s in [320usize, 64, 448, 128, 256, 192, 384, 512, 96, 224] {
            idx.insert(fresh_block(s));
        }
        idx.validate_structure().unwrap();
        let found = idx.best_fit_pop(200).unwrap();
        assert_eq!(found.size(), 224);
        assert_eq!(idx.root, found);
        idx.validate_structure().unwrap();
    }

    #[test]
    fn best_fit_returns_none_past_the_largest_block() {
        let mut idx = fresh_index();
        idx.insert(fresh_block(64));
        idx.insert(fresh_block(128));
        assert!(idx.best_fit_pop(4096).is_none());
        assert_eq!(idx.free_entry_count(), 2);
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
    fn full_drain_stays_a_valid_bst() {
        let mut idx = fresh_index();
        let mut blocks = vec![];
        for s in [256usize, 128, 384, 64, 192, 320, 448, 32 + 448] {
            let b = fresh_block(s);
            idx.insert(b);
            blocks.push(b);
            idx.validate_structure().unwrap();
        }
        for &b in &blocks {
            idx.remove_by_address(b);
            idx.validate_structure().unwrap();
        }
        assert_eq!(idx.free_entry_count(), 0);
    }
}
