//! Stack-based red-black tree: no parent field at all. Every descent
//! (insert, best-fit search, deletion) builds a bounded [`AncestorStack`]
//! of (ancestor, direction-taken) pairs as it goes, and that stack stands
//! in for the parent pointers the [`super::clrs`] and [`super::unified`]
//! variants keep persistently. Deletion of a two-children node swaps with
//! its predecessor (the maximum of the left subtree) rather than CLRS's
//! successor, since descending left-then-rightmost is the natural
//! direction to continue extending the stack we already built finding
//! the node itself.

use crate::block::{BlockPtr, Color};
use crate::duplist;
use crate::index::node::Node;
use crate::index::{check_bst_property, check_duplicate_chain, AncestorStack, Dir, FreeIndex};
use crate::index::rbtree::check_red_black_heights;

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

pub struct Stacked {
    root: BlockPtr,
    sentinel: BlockPtr,
    rep_count: usize,
    dup_count: usize,
}

impl Default for Stacked {
    fn default() -> Self {
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self { root: nil, sentinel: nil, rep_count: 0, dup_count: 0 }
    }
}

impl Stacked {
    fn rotate(&mut self, x: BlockPtr, dir: Dir, parent: Option<(BlockPtr, Dir)>) -> BlockPtr {
        let opp = dir.opposite();
        let y = child(x, opp);
        let y_child = child(y, dir);
        set_child(x, opp, y_child);
        set_child(y, dir, x);
        match parent {
            Some((p, pdir)) => set_child(p, pdir, y),
            None => self.root = y,
        }
        y
    }

    fn insert_fixup(&mut self, stack: &mut AncestorStack) {
        let nil = self.sentinel;
        loop {
            let Some((p, pdir)) = stack.peek() else { break };
            if p.color() != Color::Red {
                break;
            }
            stack.pop();
            let Some((g, gdir)) = stack.peek() else { break };
            let uncle = child(g, gdir.opposite());
            if uncle != nil && uncle.color() == Color::Red {
                p.set_color(Color::Black);
                uncle.set_color(Color::Black);
                g.set_color(Color::Red);
                stack.pop();
                continue;
            }
            stack.pop();
            let great_grandparent = stack.peek();
            let winner = if pdir == gdir {
                self.rotate(g, gdir.opposite(), great_grandparent)
            } else {
                self.rotate(p, pdir.opposite(), Some((g, gdir)));
                self.rotate(g, gdir.opposite(), great_grandparent)
            };
            winner.set_color(Color::Black);
            g.set_color(Color::Red);
            break;
        }
        self.root.set_color(Color::Black);
    }

    fn delete_fixup(&mut self, mut x: BlockPtr, stack: &mut AncestorStack) {
        let nil = self.sentinel;
        while x != self.root && x.color() == Color::Black {
            let Some((parent, dir)) = stack.peek() else { break };
            let mut w = child(parent, dir.opposite());
            if w.color() == Color::Red {
                w.set_color(Color::Black);
                parent.set_color(Color::Red);
                self.rotate(parent, dir, stack.peek_at(1));
                w = child(parent, dir.opposite());
            }
            let near = child(w, dir);
            let far = child(w, dir.opposite());
            let near_black = near == nil || near.color() == Color::Black;
            let far_black = far == nil || far.color() == Color::Black;
            if near_black && far_black {
                w.set_color(Color::Red);
                stack.pop();
                x = parent;
            } else {
                if far_black {
                    if near != nil {
                        near.set_color(Color::Black);
                    }
                    w.set_color(Color::Red);
                    self.rotate(w, dir.opposite(), Some((parent, dir.opposite())));
                    w = child(parent, dir.opposite());
                }
                w.set_color(parent.color());
                parent.set_color(Color::Black);
                let far2 = child(w, dir.opposite());
                if far2 != nil {
                    far2.set_color(Color::Black);
                }
                self.rotate(parent, dir, stack.peek_at(1));
                x = self.root;
            }
        }
        x.set_color(Color::Black);
    }

    fn delete_representative(&mut self, rep: BlockPtr, mut stack: AncestorStack) {
        let nil = self.sentinel;
        let rep_node = Node::new(rep);
        let x;
        let victim_color;
        if rep_node.left() == nil || rep_node.right() == nil {
            let dir = if rep_node.left() != nil { Dir::Left } else { Dir::Right };
            let c = child(rep, dir);
            match stack.peek() {
                Some((p, pdir)) => set_child(p, pdir, c),
                None => self.root = c,
            }
            victim_color = rep.color();
            x = c;
        } else {
            let rep_parent_entry = stack.peek();
            let rep_slot_index = stack.len();
            stack.push(rep, Dir::Left);
            let mut pred = rep_node.left();
            while child(pred, Dir::Right) != nil {
                stack.push(pred, Dir::Right);
                pred = child(pred, Dir::Right);
            }
            stack.set_node_at(rep_slot_index, pred);
            let pred_node = Node::new(pred);
            victim_color = pred.color();
            x = pred_node.left();
            let (pred_parent, pred_dir) = stack.peek().expect("predecessor always has a parent entry");
            if pred_parent != pred {
                set_child(pred_parent, pred_dir, x);
                pred_node.set_left(rep_node.left());
            }
            pred_node.set_right(rep_node.right());
            pred.set_color(rep.color());
            match rep_parent_entry {
                Some((gp, gdir)) => set_child(gp, gdir, pred),
                None => self.root = pred,
            }
        }
        self.rep_count -= 1;
        if victim_color == Color::Black {
            self.delete_fixup(x, &mut stack);
        }
    }

    fn promote_representative(&mut self, rep: BlockPtr, stack: &AncestorStack) -> bool {
        let Some((promoted, _)) = duplist::promote_head(Node::new(rep), self.sentinel) else {
            return false;
        };
        let promoted_block = promoted.block();
        match stack.peek() {
            Some((p, dir)) => set_child(p, dir, promoted_block),
            None => self.root = promoted_block,
        }
        self.dup_count -= 1;
        true
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
}

impl FreeIndex for Stacked {
    // header + left + right + list_start + footer: no parent slot.
    const MIN_BLOCK_SIZE: usize = 5 * crate::block::WORD;
    const HAS_COLOR: bool = true;
    const NAME: &'static str = "rbtree-stacked";

    fn set_sentinel(&mut self, sentinel: BlockPtr) {
        self.sentinel = sentinel;
        self.root = sentinel;
    }

    fn insert(&mut self, block: BlockPtr) {
        let nil = self.sentinel;
        let node = Node::new(block);
        let size = block.size();
        let mut stack = AncestorStack::new();
        let mut cur = self.root;
        while cur != nil {
            let cs = cur.size();
            if size == cs {
                let current_parent = stack.peek().map_or(nil, |(p, _)| p);
                duplist::push_duplicate(Node::new(cur), node, nil, current_parent);
                self.dup_count += 1;
                return;
            }
            let dir = if size < cs { Dir::Left } else { Dir::Right };
            stack.push(cur, dir);
            cur = child(cur, dir);
        }
        node.set_left(nil);
        node.set_right(nil);
        node.set_list_start(nil);
        block.set_color(Color::Red);
        match stack.peek() {
            Some((p, dir)) => set_child(p, dir, block),
            None => self.root = block,
        }
        self.rep_count += 1;
        self.insert_fixup(&mut stack);
    }

    fn best_fit_pop(&mut self, k: usize) -> Option<BlockPtr> {
        let rep = self.find_best(k);
        if rep == self.sentinel {
            return None;
        }
        if let Some(dup) = duplist::pop_arbitrary(Node::new(rep), self.sentinel) {
            self.dup_count -= 1;
            return Some(dup);
        }
        let mut stack = AncestorStack::new();
        let found = self.find_exact_with_stack(rep.size(), &mut stack);
        debug_assert_eq!(found, rep, "best-fit candidate must still be where find_best left it");
        self.delete_representative(rep, stack);
        Some(rep)
    }

    fn remove_by_address(&mut self, block: BlockPtr) {
        let mut stack = AncestorStack::new();
        let rep = self.find_exact_with_stack(block.size(), &mut stack);
        debug_assert!(rep != self.sentinel, "block claims to be indexed but its size isn't in the tree");
        if rep == block {
            if !self.promote_representative(rep, &stack) {
                self.delete_representative(rep, stack);
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
        if self.root == self.sentinel {
            return Ok(());
        }
        if self.root.color() != Color::Black {
            return Err("stacked: root must be black");
        }
        check_bst_property(self.root, self.sentinel)?;
        check_red_black_heights(self.root, self.sentinel)?;
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

    fn fresh_index() -> Stacked {
        let mut idx = Stacked::default();
        idx.set_sentinel(fresh_block(Stacked::MIN_BLOCK_SIZE));
        idx
    }

    #[test]
    fn insert_and_best_fit_single_node() {
        let mut idx = fresh_index();
        let b = fresh_block(64);
        idx.insert(b);
        idx.validate_structure().unwrap();
        assert_eq!(idx.best_fit_pop(64), Some(b));
    }

    #[test]
    fn descending_inserts_then_full_drain_stays_balanced() {
        let mut idx = fresh_index();
        let mut blocks = vec![];
        for s in (1..=24).rev().map(|i| i * 32) {
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
    fn two_child_deletion_uses_predecessor_swap() {
        let mut idx = fresh_index();
        let sizes = [256usize, 128, 384, 64, 192, 320, 448];
        for &s in &sizes {
            idx.insert(fresh_block(s));
        }
        idx.validate_structure().unwrap();
        let removed = idx.best_fit_pop(256).unwrap();
        assert_eq!(removed.size(), 256);
        idx.validate_structure().unwrap();
    }

    #[test]
    fn duplicate_promotion_without_parent_pointers() {
        let mut idx = fresh_index();
        let a = fresh_block(64);
        let b = fresh_block(64);
        let c = fresh_block(128);
        idx.insert(a);
        idx.insert(b);
        idx.insert(c);
        idx.remove_by_address(a);
        idx.validate_structure().unwrap();
        assert_eq!(idx.free_entry_count(), 2);
    }
}
