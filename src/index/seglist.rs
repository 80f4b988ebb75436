//! 4.C.1 — segregated free list.
//!
//! An array of bucket heads indexes size classes: the first
//! [`crate::config::EXACT_BUCKETS`] buckets hold one exact size apiece at
//! the alignment step, the rest are power-of-two ranges, and the last
//! bucket absorbs everything past the top of the table (spec.md 4.C.1,
//! resolved in [`crate::config::seglist_bucket`]). Each bucket is a
//! doubly linked, loosely address-unordered list threaded through the
//! block's own payload — insertion is head-first and O(1); `best_fit_pop`
//! scans forward from the requested size's bucket until it finds a fit.

use crate::block::BlockPtr;
use crate::config::{seglist_bucket, SEGLIST_BUCKETS};
use crate::index::node::Node;
use crate::index::FreeIndex;

/// Segregated free list index (spec.md 4.C.1).
pub struct SegList {
    buckets: [BlockPtr; SEGLIST_BUCKETS],
    sentinel: BlockPtr,
    count: usize,
}

impl Default for SegList {
    fn default() -> Self {
        // Placeholder sentinel; overwritten by `set_sentinel` before use.
        let nil = unsafe { BlockPtr::from_addr(0) };
        Self {
            buckets: [nil; SEGLIST_BUCKETS],
            sentinel: nil,
            count: 0,
        }
    }
}

impl SegList {
    fn bucket_of(&self, size: usize) -> usize {
        seglist_bucket(size, Self::MIN_BLOCK_SIZE)
    }

    fn unlink(&mut self, bucket: usize, node: Node) {
        let prev = node.left();
        let next = node.right();
        if prev == self.sentinel {
            self.buckets[bucket] = next;
        } else {
            Node::new(prev).set_right(next);
        }
        if next != self.sentinel {
            Node::new(next).set_left(prev);
        }
        self.count -= 1;
    }
}

impl FreeIndex for SegList {
    // header(8) + prev(8) + next(8) + footer(8), matching spec.md's
    // literal 32-byte minimum block size example.
    const MIN_BLOCK_SIZE: usize = 4 * crate::block::WORD;
    const HAS_COLOR: bool = false;
    const NAME: &'static str = "segregated-list";

    fn set_sentinel(&mut self, sentinel: BlockPtr) {
        self.sentinel = sentinel;
        for head in &mut self.buckets {
            *head = sentinel;
        }
    }

    fn insert(&mut self, block: BlockPtr) {
        let bucket = self.bucket_of(block.size());
        let node = Node::new(block);
        let old_head = self.buckets[bucket];
        node.set_left(self.sentinel);
        node.set_right(old_head);
        if old_head != self.sentinel {
            Node::new(old_head).set_left(block);
        }
        self.buckets[bucket] = block;
        self.count += 1;
    }

    fn best_fit_pop(&mut self, k: usize) -> Option<BlockPtr> {
        let start = self.bucket_of(k);
        for bucket in start..SEGLIST_BUCKETS {
            let mut cur = self.buckets[bucket];
            while cur != self.sentinel {
                let node = Node::new(cur);
                if cur.size() >= k {
                    self.unlink(bucket, node);
                    return Some(cur);
                }
                cur = node.right();
            }
        }
        None
    }

    fn remove_by_address(&mut self, block: BlockPtr) {
        let bucket = self.bucket_of(block.size());
        self.unlink(bucket, Node::new(block));
    }

    fn free_entry_count(&self) -> usize {
        self.count
    }

    fn total_free_bytes(&self) -> usize {
        let mut total = 0;
        for &head in &self.buckets {
            let mut cur = head;
            while cur != self.sentinel {
                total += cur.size();
                cur = Node::new(cur).right();
            }
        }
        total
    }

    fn validate_structure(&self) -> Result<(), &'static str> {
        let mut seen = 0usize;
        for (bucket, &head) in self.buckets.iter().enumerate() {
            let mut cur = head;
            let mut prev = self.sentinel;
            while cur != self.sentinel {
                if self.bucket_of(cur.size()) != bucket {
                    return Err("seglist: block indexed under the wrong bucket");
                }
                let node = Node::new(cur);
                if node.left() != prev {
                    return Err("seglist: broken back-link");
                }
                prev = cur;
                cur = node.right();
                seen += 1;
            }
        }
        if seen != self.count {
            return Err("seglist: count mismatch against walked entries");
        }
        Ok(())
    }

    fn dump(&self, w: &mut dyn core::fmt::Write, verbose: bool) -> core::fmt::Result {
        for (bucket, &head) in self.buckets.iter().enumerate() {
            if head == self.sentinel {
                continue;
            }
            if verbose {
                if bucket == SEGLIST_BUCKETS - 1 {
                    write!(w, "bucket {bucket} ({}): ", Self::last_bucket_label())?;
                } else {
                    write!(w, "bucket {bucket}: ")?;
                }
            }
            let mut cur = head;
            while cur != self.sentinel {
                write!(w, "{} ", cur.size())?;
                cur = Node::new(cur).right();
            }
            if verbose {
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

impl SegList {
    /// How the catch-all bucket's upper edge is described in verbose dumps;
    /// see the Open Question resolved in [`crate::config::seglist_bucket`].
    const fn last_bucket_label() -> &'static str {
        if cfg!(feature = "literal-bucket-cap") {
            "cap=65535"
        } else {
            "+inf"
        }
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

    fn fresh_index() -> SegList {
        let mut idx = SegList::default();
        idx.set_sentinel(fresh_block(SegList::MIN_BLOCK_SIZE));
        idx
    }

    #[test]
    fn insert_then_best_fit_exact_bucket() {
        let mut idx = fresh_index();
        let b = fresh_block(SegList::MIN_BLOCK_SIZE);
        idx.insert(b);
        assert_eq!(idx.free_entry_count(), 1);
        let popped = idx.best_fit_pop(SegList::MIN_BLOCK_SIZE).unwrap();
        assert_eq!(popped, b);
        assert_eq!(idx.free_entry_count(), 0);
    }

    #[test]
    fn best_fit_scans_forward_across_buckets() {
        let mut idx = fresh_index();
        let big = fresh_block(4096);
        idx.insert(big);
        let popped = idx.best_fit_pop(SegList::MIN_BLOCK_SIZE).unwrap();
        assert_eq!(popped, big);
    }

    #[test]
    fn remove_by_address_mid_bucket() {
        let mut idx = fresh_index();
        let a = fresh_block(SegList::MIN_BLOCK_SIZE);
        let b = fresh_block(SegList::MIN_BLOCK_SIZE);
        let c = fresh_block(SegList::MIN_BLOCK_SIZE);
        idx.insert(a);
        idx.insert(b);
        idx.insert(c);
        idx.remove_by_address(b);
        assert_eq!(idx.free_entry_count(), 2);
        idx.validate_structure().unwrap();
    }
}
