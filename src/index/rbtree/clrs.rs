//! CLRS-faithful red-black tree: a persistent parent pointer per node,
//! fixups written out with explicit left/right cases exactly as Cormen,
//! Leiserson, Rivest & Stein present them (Introduction to Algorithms,
//! 3rd ed., §13).

use crate::block::{BlockPtr, Color};
use crate::duplist;
use crate::index::node::Node;
use crate::index::rbtree::{check_red_black_heights, subtree_min};
use crate::index::{check_bst_property, check_duplicate_chain, FreeIndex};

pub struct Clrs {
    root: BlockPtr,
    sentinel: BlockPtr,
    rep_count: usize,
    dup_count: usize,
}

impl Default for Clrs {
    fn default() -> Self {
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self { root: nil, sentinel: nil, rep_count: 0, dup_count: 0 }
    }
}

impl Clrs {
    fn left_rotate(&mut self, x: BlockPtr) {
        let nil = self.sentinel;
        let x_node = Node::new(x);
        let y = x_node.right();
        let y_node = Node::new(y);
        let y_left = y_node.left();

        x_node.set_right(y_left);
        if y_left != nil {
            Node::new(y_left).set_parent(x);
        }
        let x_parent = x_node.parent();
        y_node.set_parent(x_parent);
        if x_parent == nil {
            self.root = y;
        } else if x == Node::new(x_parent).left() {
            Node::new(x_parent).set_left(y);
        } else {
            Node::new(x_parent).set_right(y);
        }
        y_node.set_left(x);
        x_node.set_parent(y);
    }

    fn right_rotate(&mut self, x: BlockPtr) {
        let nil = self.sentinel;
        let x_node = Node::new(x);
        let y = x_node.left();
        let y_node = Node::new(y);
        let y_right = y_node.right();

        x_node.set_left(y_right);
        if y_right != nil {
            Node::new(y_right).set_parent(x);
        }
        let x_parent = x_node.parent();
        y_node.set_parent(x_parent);
        if x_parent == nil {
            self.root = y;
        } else if x == Node::new(x_parent).left() {
            Node::new(x_parent).set_left(y);
        } else {
            Node::new(x_parent).set_right(y);
        }
        y_node.set_right(x);
        x_node.set_parent(y);
    }

    fn insert_fixup(&mut self, mut z: BlockPtr) {
        let nil = self.sentinel;
        while Node::new(z).parent() != nil && Node::new(z).parent().color() == Color::Red {
            let parent = Node::new(z).parent();
            let grandparent = Node::new(parent).parent();
            let gp_node = Node::new(grandparent);
            if parent == gp_node.left() {
                let uncle = gp_node.right();
                if uncle != nil && uncle.color() == Color::Red {
                    parent.set_color(Color::Black);
                    uncle.set_color(Color::Black);
                    grandparent.set_color(Color::Red);
                    z = grandparent;
                } else {
                    if z == Node::new(parent).right() {
                        z = parent;
                        self.left_rotate(z);
                    }
                    let parent = Node::new(z).parent();
                    let grandparent = Node::new(parent).parent();
                    parent.set_color(Color::Black);
                    grandparent.set_color(Color::Red);
                    self.right_rotate(grandparent);
                }
            } else {
                let uncle = gp_node.left();
                if uncle != nil && uncle.color() == Color::Red {
                    parent.set_color(Color::Black);
                    uncle.set_color(Color::Black);
                    grandparent.set_color(Color::Red);
                    z = grandparent;
                } else {
                    if z == Node::new(parent).left() {
                        z = parent;
                        self.right_rotate(z);
                    }
                    let parent = Node::new(z).parent();
                    let grandparent = Node::new(parent).parent();
                    parent.set_color(Color::Black);
                    grandparent.set_color(Color::Red);
                    self.left_rotate(grandparent);
                }
            }
        }
        self.root.set_color(Color::Black);
    }

    fn transplant(&mut self, u: BlockPtr, v: BlockPtr) {
        let nil = self.sentinel;
        let u_parent = Node::new(u).parent();
        if u_parent == nil {
            self.root = v;
        } else if u == Node::new(u_parent).left() {
            Node::new(u_parent).set_left(v);
        } else {
            Node::new(u_parent).set_right(v);
        }
        Node::new(v).set_parent(u_parent);
    }

    fn delete_fixup(&mut self, mut x: BlockPtr) {
        let nil = self.sentinel;
        while x != self.root && x.color() == Color::Black {
            let x_parent = Node::new(x).parent();
            if x == Node::new(x_parent).left() {
                let mut w = Node::new(x_parent).right();
                if w.color() == Color::Red {
                    w.set_color(Color::Black);
                    x_parent.set_color(Color::Red);
                    self.left_rotate(x_parent);
                    w = Node::new(x_parent).right();
                }
                let wl = Node::new(w).left();
                let wr = Node::new(w).right();
                let wl_black = wl == nil || wl.color() == Color::Black;
                let wr_black = wr == nil || wr.color() == Color::Black;
                if wl_black && wr_black {
                    w.set_color(Color::Red);
                    x = x_parent;
                } else {
                    if wr_black {
                        if wl != nil {
                            wl.set_color(Color::Black);
                        }
                        w.set_color(Color::Red);
                        self.right_rotate(w);
                        w = Node::new(x_parent).right();
                    }
                    let x_parent = Node::new(x).parent();
                    w.set_color(x_parent.color());
                    x_parent.set_color(Color::Black);
                    let wr = Node::new(w).right();
                    if wr != nil {
                        wr.set_color(Color::Black);
                    }
                    self.left_rotate(x_parent);
                    x = self.root;
                }
            } else {
                let mut w = Node::new(x_parent).left();
                if w.color() == Color::Red {
                    w.set_color(Color::Black);
                    x_parent.set_color(Color::Red);
                    self.right_rotate(x_parent);
                    w = Node::new(x_parent).left();
                }
                let wl = Node::new(w).left();
                let wr = Node::new(w).right();
                let wl_black = wl == nil || wl.color() == Color::Black;
                let wr_black = wr == nil || wr.color() == Color::Black;
                if wl_black && wr_black {
                    w.set_color(Color::Red);
                    x = x_parent;
                } else {
                    if wl_black {
                        if wr != nil {
                            wr.set_color(Color::Black);
                        }
                        w.set_color(Color::Red);
                        self.left_rotate(w);
                        w = Node::new(x_parent).left();
                    }
                    let x_parent = Node::new(x).parent();
                    w.set_color(x_parent.color());
                    x_parent.set_color(Color::Black);
                    let wl = Node::new(w).left();
                    if wl != nil {
                        wl.set_color(Color::Black);
                    }
                    self.right_rotate(x_parent);
                    x = self.root;
                }
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
        } else if Node::new(parent).left() == rep {
            Node::new(parent).set_left(promoted_block);
        } else {
            Node::new(parent).set_right(promoted_block);
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

impl FreeIndex for Clrs {
    // header + left + right + list_start + parent + footer
    const MIN_BLOCK_SIZE: usize = 6 * crate::block::WORD;
    const HAS_COLOR: bool = true;
    const NAME: &'static str = "rbtree-clrs";

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
            } else if size < xs {
                x = Node::new(x).left();
            } else {
                x = Node::new(x).right();
            }
        }
        node.set_left(nil);
        node.set_right(nil);
        node.set_list_start(nil);
        node.set_parent(y);
        block.set_color(Color::Red);
        if y == nil {
            self.root = block;
        } else if size < y.size() {
            Node::new(y).set_left(block);
        } else {
            Node::new(y).set_right(block);
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
            return Err("clrs: root must be black");
        }
        check_bst_property(self.root, self.sentinel)?;
        check_red_black_heights(self.root, self.sentinel)?;
        // The aux slot a duplicate head carries is a write-once hint, never
        // refreshed by rotation; this variant keeps a real `parent` field
        // instead and relies on `check_back_links` below to validate it, so
        // the duplicate list only needs the size/termination check here.
        check_duplicate_chain(self.root, self.sentinel)?;

        fn check_back_links(n: BlockPtr, sentinel: BlockPtr) -> Result<(), &'static str> {
            if n == sentinel {
                return Ok(());
            }
            let node = Node::new(n);
            let (l, r) = (node.left(), node.right());
            if l != sentinel && Node::new(l).parent() != n {
                return Err("clrs: left child's parent back-link is broken");
            }
            if r != sentinel && Node::new(r).parent() != n {
                return Err("clrs: right child's parent back-link is broken");
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
