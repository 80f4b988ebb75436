//! Top-down red-black tree (Sedgewick / Julienne-Walker style): every
//! operation is a single pass from root to leaf. Insertion resolves a
//! red-red violation the moment a color flip creates one, using a
//! three-node sliding window (`grandparent`/`parent`/`current`) instead of
//! a stack. Deletion pushes a red node down the search path as it
//! descends, so the node that ends up being physically spliced out is
//! always safe to remove without a second, separate rebalancing pass.
//!
//! Neither operation keeps a persistent parent pointer or an unbounded
//! ancestor stack — the defining trait of the top-down style (spec.md
//! 4.C.2).

use crate::block::{BlockPtr, Color};
use crate::duplist;
use crate::index::node::Node;
use crate::index::rbtree::check_red_black_heights;
use crate::index::{check_bst_property, check_duplicate_chain, Dir, FreeIndex};

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

fn is_red(n: BlockPtr) -> bool {
    n.color() == Color::Red
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
    /// A single rotation that also fixes up colors in the same step
    /// (Sedgewick's `single`): `dir` names the side that keeps its
    /// position as the rotated-down node's child.
    fn single(&mut self, root: BlockPtr, dir: Dir) -> BlockPtr {
        let opp = dir.opposite();
        let save = child(root, opp);
        set_child(root, opp, child(save, dir));
        set_child(save, dir, root);
        root.set_color(Color::Red);
        save.set_color(Color::Black);
        save
    }

    fn double(&mut self, root: BlockPtr, dir: Dir) -> BlockPtr {
        let opp = dir.opposite();
        let rotated = self.single(child(root, opp), opp);
        set_child(root, opp, rotated);
        self.single(root, dir)
    }

    /// Treat `None` as the virtual root-of-roots: its only meaningful
    /// child is the slot holding [`Self::root`] itself, always reached via
    /// [`Dir::Right`] (mirroring the classic algorithm's false tree root,
    /// whose other link is never used).
    fn cursor_child(&self, cursor: Option<BlockPtr>, dir: Dir) -> BlockPtr {
        match cursor {
            None => {
                if dir == Dir::Right {
                    self.root
                } else {
                    self.sentinel
                }
            }
            Some(c) => child(c, dir),
        }
    }

    fn cursor_set_child(&mut self, cursor: Option<BlockPtr>, dir: Dir, v: BlockPtr) {
        match cursor {
            None => {
                if dir == Dir::Right {
                    self.root = v;
                }
            }
            Some(c) => set_child(c, dir, v),
        }
    }

    fn find_with_parent(&self, size: usize) -> (Option<BlockPtr>, Dir, BlockPtr) {
        let nil = self.sentinel;
        let mut parent: Option<BlockPtr> = None;
        let mut dir = Dir::Right;
        let mut cur = self.root;
        while cur != nil {
            let cs = cur.size();
            if cs == size {
                return (parent, dir, cur);
            }
            parent = Some(cur);
            dir = if size < cs { Dir::Left } else { Dir::Right };
            cur = child(cur, dir);
        }
        (parent, dir, nil)
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

    fn promote_representative(&mut self, rep: BlockPtr) -> bool {
        let Some((promoted, _)) = duplist::promote_head(Node::new(rep), self.sentinel) else {
            return false;
        };
        let (parent, dir, found) = self.find_with_parent(rep.size());
        debug_assert_eq!(found, rep, "promotion target must still be where it was found");
        self.cursor_set_child(parent, dir, promoted.block());
        self.dup_count -= 1;
        true
    }

    /// Removes the representative with `target_size` from the tree in a
    /// single top-down pass: a red node is pushed down the search path as
    /// we descend (so whatever we physically splice out is always safe to
    /// remove), and if the representative has two children the pass keeps
    /// going — left once, then rightmost — to its predecessor, which is
    /// grafted into the representative's old tree position exactly as
    /// [`super::clrs`]'s successor splice does, just discovered during the
    /// same descent instead of a second lookup.
    fn delete_representative(&mut self, target_size: usize) {
        let nil = self.sentinel;
        if self.root == nil {
            return;
        }

        let mut g: Option<BlockPtr> = None;
        let mut p: Option<BlockPtr> = None;
        let mut cursor: Option<BlockPtr> = None;
        let mut dir = Dir::Right;
        let mut last = Dir::Right;

        let mut found: Option<BlockPtr> = None;
        let mut found_parent: Option<BlockPtr> = None;
        let mut found_dir = Dir::Right;

        loop {
            let next = self.cursor_child(cursor, dir);
            if next == nil {
                break;
            }
            last = dir;
            g = p;
            p = cursor;
            cursor = Some(next);
            let q = next;
            dir = if q.size() < target_size { Dir::Right } else { Dir::Left };

            if q.size() == target_size {
                found = Some(q);
                found_parent = p;
                found_dir = last;
            }

            if !is_red(q) && !is_red(child(q, dir)) {
                if is_red(child(q, dir.opposite())) {
                    let new_top = self.single(q, dir);
                    self.cursor_set_child(p, last, new_top);
                    p = Some(new_top);
                } else if let Some(pp) = p {
                    let s = child(pp, last.opposite());
                    if s != nil {
                        let s_near = child(s, last.opposite());
                        let s_far = child(s, last);
                        if !is_red(s_near) && !is_red(s_far) {
                            pp.set_color(Color::Black);
                            s.set_color(Color::Red);
                            q.set_color(Color::Red);
                        } else {
                            let dir2 = match g {
                                None => Dir::Right,
                                Some(gg) => {
                                    if child(gg, Dir::Right) == pp { Dir::Right } else { Dir::Left }
                                }
                            };
                            let new_top = if is_red(s_far) {
                                self.double(pp, last)
                            } else {
                                self.single(pp, last)
                            };
                            self.cursor_set_child(g, dir2, new_top);
                            q.set_color(Color::Red);
                            new_top.set_color(Color::Red);
                            let l = child(new_top, Dir::Left);
                            let r = child(new_top, Dir::Right);
                            if l != nil {
                                l.set_color(Color::Black);
                            }
                            if r != nil {
                                r.set_color(Color::Black);
                            }
                            p = Some(new_top);
                        }
                    }
                }
            }
        }

        if let Some(f) = found {
            let q_final = cursor.expect("loop always advances at least once when a match exists");
            let replacement = {
                let l = child(q_final, Dir::Left);
                if l != nil { l } else { child(q_final, Dir::Right) }
            };
            self.cursor_set_child(p, last, replacement);

            if q_final != f {
                let f_node = Node::new(f);
                let qf_node = Node::new(q_final);
                qf_node.set_left(f_node.left());
                qf_node.set_right(f_node.right());
                q_final.set_color(f.color());
                self.cursor_set_child(found_parent, found_dir, q_final);
            }
            self.rep_count -= 1;
        }
        if self.root != nil {
            self.root.set_color(Color::Black);
        }
    }
}

impl FreeIndex for Topdown {
    const MIN_BLOCK_SIZE: usize = 5 * crate::block::WORD;
    const HAS_COLOR: bool = true;
    const NAME: &'static str = "rbtree-topdown";

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
            block.set_color(Color::Black);
            self.root = block;
            self.rep_count += 1;
            return;
        }

        let mut gg: Option<BlockPtr> = None;
        let mut g = nil;
        let mut p = nil;
        let mut dir = Dir::Right;
        let mut last = Dir::Right;
        let mut q = self.root;

        loop {
            if q == nil {
                node.set_left(nil);
                node.set_right(nil);
                node.set_list_start(nil);
                block.set_color(Color::Red);
                set_child(p, dir, block);
                q = block;
            } else {
                let l = child(q, Dir::Left);
                let r = child(q, Dir::Right);
                if l != nil && r != nil && l.color() == Color::Red && r.color() == Color::Red {
                    q.set_color(Color::Red);
                    l.set_color(Color::Black);
                    r.set_color(Color::Black);
                }
            }

            if q.color() == Color::Red && p != nil && p.color() == Color::Red {
                let dir2 = match gg {
                    None => Dir::Right,
                    Some(a) => {
                        if child(a, Dir::Right) == g { Dir::Right } else { Dir::Left }
                    }
                };
                let winner = if dir == last {
                    self.single(g, last.opposite())
                } else {
                    self.double(g, last.opposite())
                };
                match gg {
                    Some(a) => set_child(a, dir2, winner),
                    None => self.root = winner,
                }
            }

            if q != block && q.size() == size {
                duplist::push_duplicate(Node::new(q), node, nil, p);
                self.dup_count += 1;
                self.root.set_color(Color::Black);
                return;
            }
            if q == block {
                break;
            }

            last = dir;
            dir = if size < q.size() { Dir::Left } else { Dir::Right };
            if g != nil {
                gg = Some(g);
            }
            g = p;
            p = q;
            q = child(q, dir);
        }

        self.rep_count += 1;
        self.root.set_color(Color::Black);
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
        let size = rep.size();
        self.delete_representative(size);
        Some(rep)
    }

    fn remove_by_address(&mut self, block: BlockPtr) {
        let (_, _, rep) = self.find_with_parent(block.size());
        debug_assert!(rep != self.sentinel, "block claims to be indexed but its size isn't in the tree");
        if rep == block {
            if !self.promote_representative(rep) {
                self.delete_representative(rep.size());
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
            return Err("topdown: root must be black");
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

    fn fresh_index() -> Topdown {
        let mut idx = Topdown::default();
        idx.set_sentinel(fresh_block(Topdown::MIN_BLOCK_SIZE));
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
    fn random_order_inserts_then_full_drain() {
        let sizes = [320usize, 64, 448, 128, 256, 192, 384, 512, 96, 224];
        let mut idx = fresh_index();
        let mut blocks = vec![];
        for &s in &sizes {
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
    fn two_child_removal_grafts_predecessor() {
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
}
