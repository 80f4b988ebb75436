//! Unified-symmetry red-black tree: the same persistent parent pointer as
//! [`super::clrs`], but every left/right pair of fixup cases is collapsed
//! into one case parameterized by a [`Dir`].

use crate::block::{BlockPtr, Color};
use crate::duplist;
use crate::index::node::Node;
use crate::index::rbtree::{check_red_black_heights, subtree_min};
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

fn dir_of(n: BlockPtr, parent: BlockPtr) -> Dir {
    if Node::new(parent).left() == n {
        Dir::Left
    } else {
        Dir::Right
    }
}

pub struct Unified {
    root: BlockPtr,
    sentinel: BlockPtr,
    rep_count: usize,
    dup_count: usize,
}

impl Default for Unified {
    fn default() -> Self {
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self { root: nil, sentinel: nil, rep_count: 0, dup_count: 0 }
    }
}

impl Unified {
    /// `dir == Dir::Left` performs a classic left-rotation about `x`;
    /// `dir == Dir::Right` its mirror. Every case in `insert_fixup` and
    /// `delete_fixup` calls this once instead of branching between two
    /// hand-written rotation functions.
    fn rotate(&mut self, x: BlockPtr, dir: Dir) {
        let nil = self.sentinel;
        let opp = dir.opposite();
        let y = child(x, opp);
        let y_child = child(y, dir);

        set_child(x, opp, y_child);
        if y_child != nil {
            Node::new(y_child).set_parent(x);
        }
        let x_parent = Node::new(x).parent();
        Node::new(y).set_parent(x_parent);
        if x_parent == nil {
            self.root = y;
        } else if dir_of(x, x_parent) == dir {
            set_child(x_parent, dir, y);
        } else {
            set_child(x_parent, opp, y);
        }
        set_child(y, dir, x);
        Node::new(x).set_parent(y);
    }

    fn insert_fixup(&mut self, mut z: BlockPtr) {
        let nil = self.sentinel;
        while Node::new(z).parent() != nil && Node::new(z).parent().color() == Color::Red {
            let parent = Node::new(z).parent();
            let grandparent = Node::new(parent).parent();
            let pdir = dir_of(parent, grandparent);
            let uncle = child(grandparent, pdir.opposite());
            if uncle != nil && uncle.color() == Color::Red {
                parent.set_color(Color::Black);
                uncle.set_color(Color::Black);
                grandparent.set_color(Color::Red);
                z = grandparent;
            } else {
                if z == child(parent, pdir.opposite()) {
                    z = parent;
                    self.rotate(z, pdir);
                }
                let parent = Node::new(z).parent();
                let grandparent = Node::new(parent).parent();
                parent.set_color(Color::Black);
                grandparent.set_color(Color::Red);
                self.rotate(grandparent, pdir.opposite());
            }
        }
        self.root.set_color(Color::Black);
    }

    fn transplant(&mut self, u: BlockPtr, v: BlockPtr) {
        let nil = self.sentinel;
        let u_parent = Node::new(u).parent();
        if u_parent == nil {
            self.root = v;
        } else {
            set_child(u_parent, dir_of(u, u_parent), v);
        }
        Node::new(v).set_parent(u_parent);
    }

    fn delete_fixup(&mut self, mut x: BlockPtr) {
        let nil = self.sentinel;
        while x != self.root && x.color() == Color::Black {
            let x_parent = Node::new(x).parent();
            let dir = dir_of(x, x_parent);
            let mut w = child(x_parent, dir.opposite());
            if w.color() == Color::Red {
                w.set_color(Color::Black);
                x_parent.set_color(Color::Red);
                self.rotate(x_parent, dir);
                w = child(x_parent, dir.opposite());
            }
            let near = child(w, dir);
            let far = child(w, dir.opposite());
            let near_black = near == nil || near.color() == Color::Black;
            let far_black = far == nil || far.color() == Color::Black;
            if near_black && far_black {
                w.set_color(Color::Red);
                x = x_parent;
            } else {
                if far_black {
                    if near != nil {
                        near.set_color(Color::Black);
                    }
                    w.set_color(Color::Red);
                    self.rotate(w, dir.opposite());
                    w = child(x_parent, dir.opposite());
                }
                let x_parent = Node::new(x).parent();
                w.set_color(x_parent.color());
                x_parent.set_color(Color::Black);
                let far = child(w, dir.opposite());
                if far != nil {
                    far.set_color(Color::Black);
                }
                self.rotate(x_parent, dir);
                x = self.root;
            }
        }
        x.set_color(Color::Black);
    }

    fn delete_representative(&mut self, z: BlockPtr) {
        let nil = self.sentinel;
        let z_node = Node::new(z);
        let mut y = z;
        let mut y_original_color = y.color();
        let x;
        if z_node.left() == nil {
            x = z_node.right();
            self.transplant(z, z_node.right());
        } else if z_node.right() == nil {
            x = z_node.left();
            self.transplant(z, z_node.left());
        } else {
            y = subtree_min(z_node.right(), nil);
            y_original_color = y.color();
            let y_node = Node::new(y);
            x = y_node.right();
            if Node::new(y).parent() == z {
                Node::new(x).set_parent(y);
            } else {
                self.transplant(y, y_node.right());
                y_node.set_right(z_node.right());
                Node::new(y_node.right()).set_parent(y);
            }
            self.transplant(z, y);
            y_node.set_left(z_node.left());
            Node::new(y_node.left()).set_parent(y);
            y.set_color(z.color());
        }
        self.rep_count -= 1;
        if y_original_color == Color::Black {
            self.delete_fixup(x);
        }
    }

    fn promote_representative(&mut self, rep: BlockPtr) -> bool {
        let Some((promoted, _)) = duplist::promote_head(Node::new(rep), self.sentinel) else {
            return false;
        };
        let promoted_block = promoted.block();
        let parent = Node::new(rep).parent();
        promoted.set_parent(parent);
        if parent == self.sentinel {
            self.root = promoted_block;
        } else {
            set_child(parent, dir_of(rep, parent), promoted_block);
        }
        let l = promoted.left();
        let r = promoted.right();
        if l != self.sentinel {
            Node::new(l).set_parent(promoted_block);
        }
        if r != self.sentinel {
            Node::new(r).set_parent(promoted_block);
        }
        self.dup_count -= 1;
        true
    }

    fn find_exact(&self, size: usize) -> BlockPtr {
        let nil = self.sentinel;
        let mut cur = self.root;
        while cur != nil {
            let sz = cur.size();
            if sz == size {
                return cur;
            }
            cur = if size < sz { Node::new(cur).left() } else { Node::new(cur).right() };
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

impl FreeIndex for Unified {
    const MIN_BLOCK_SIZE: usize = 6 * crate::block::WORD;
    const HAS_COLOR: bool = true;
    const NAME: &'static str = "rbtree-unified";

    fn set_sentinel(&mut self, sentinel: BlockPtr) {
        self.sentinel = sentinel;
        self.root = sentinel;
    }

    fn insert(&mut self, block: BlockPtr) {
        let nil = self.sentinel;
        let node = Node::new(block);
        let size = block.size();
        let mut y = nil;
        let mut x = self.root;
        while x != nil {
            y = x;
            let xs = x.size();
            if size == xs {
                let parent_of_x = Node::new(x).parent();
                duplist::push_duplicate(Node::new(x), node, nil, parent_of_x);
                self.dup_count += 1;
                return;
            }
            x = child(x, if size < xs { Dir::Left } else { Dir::Right });
        }
        node.set_left(nil);
        node.set_right(nil);
        node.set_list_start(nil);
        node.set_parent(y);
        block.set_color(Color::Red);
        if y == nil {
            self.root = block;
        } else {
            set_child(y, if size < y.size() { Dir::Left } else { Dir::Right }, block);
        }
        self.rep_count += 1;
        self.insert_fixup(block);
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
        self.delete_representative(rep);
        Some(rep)
    }

    fn remove_by_address(&mut self, block: BlockPtr) {
        let rep = self.find_exact(block.size());
        debug_assert!(rep != self.sentinel, "block claims to be indexed but its size isn't in the tree");
        if rep == block {
            if !self.promote_representative(rep) {
                self.delete_representative(rep);
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
            return Err("unified: root must be black");
        }
        check_bst_property(self.root, self.sentinel)?;
        check_red_black_heights(self.root, self.sentinel)?;
        // Same reasoning as clrs: a real `parent` field backs this variant,
        // validated below by `check_back_links`, so the duplicate head's
        // aux slot (stale after any rotation) isn't cross-checked here.
        check_duplicate_chain(self.root, self.sentinel)?;

        fn check_back_links(n: BlockPtr, sentinel: BlockPtr) -> Result<(), &'static str> {
            if n == sentinel {
                return Ok(());
            }
            let node = Node::new(n);
            let (l, r) = (node.left(), node.right());
            if l != sentinel && Node::new(l).parent() != n {
                return Err("unified: left child's parent back-link is broken");
            }
            if r != sentinel && Node::new(r).parent() != n {
                return Err("unified: right child's parent back-link is broken");
            }
            check_back_links(l, sentinel)?;
            check_back_links(r, sentinel)
        }
        check_back_links(self.root, self.sentinel)
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

    fn fresh_index() -> Unified {
        let mut idx = Unified::default();
        idx.set_sentinel(fresh_block(Unified::MIN_BLOCK_SIZE));
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
    fn ascending_inserts_stay_balanced() {
        let mut idx = fresh_index();
        let mut blocks = vec![];
        for s in (1..=20).map(|i| i * 64) {
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
        let c = fresh_block(64);
        idx.insert(a);
        idx.insert(b);
        idx.insert(c);
        assert_eq!(idx.rep_count, 1);
        assert_eq!(idx.dup_count, 2);
        idx.remove_by_address(a);
        idx.validate_structure().unwrap();
        assert_eq!(idx.free_entry_count(), 2);
    }
}
