//! Component G: heap-diff (spec.md §6's "Heap-diff contract").
//!
//! Walks the segment once and compares each block in order against a
//! caller-supplied expectation list. Used by unit tests as a structural
//! assertion that is far more specific than a bare `validate()` pass — it
//! pins down exactly which block should be where, how big, and in what
//! state.

/// One expected block, in segment order.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedBlock {
    /// Expected client address. `None` means "this block must be free";
    /// `Some(addr)` pins the exact address a still-allocated block's client
    /// pointer must have (spec.md §6: "if address is null and the block is
    /// allocated, mark actual as error" — the complementary non-null case,
    /// left implicit in spec.md, is resolved here as "the allocated
    /// block's address must match exactly", recorded in DESIGN.md).
    pub address: Option<usize>,
    /// Expected payload size, or `None` to accept any payload ("NA" in
    /// spec.md's table).
    pub payload_bytes: Option<usize>,
}

/// Outcome for one segment position after comparing against `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActualBlock {
    /// The block matched its expectation.
    Ok { address: usize, payload_bytes: usize },
    /// The block disagreed with its expectation (wrong alloc state, wrong
    /// address, or wrong payload size).
    Mismatch { address: usize, payload_bytes: usize },
    /// The segment has more blocks than were compared — either because
    /// `expected` ran out first, or because the segment outlasted both
    /// equal-length slices. Reported on the last `actual` entry.
    HeapContinues,
    /// `expected` was longer than the segment; these entries describe
    /// positions the walker never reached.
    OutOfBounds,
}

/// Fill `actual` by walking `heap`'s segment and comparing each block in
/// order against `expected`, per spec.md §6. `actual.len()` need not equal
/// `expected.len()`; only the first `min(actual.len(), expected.len())`
/// slots are compared, with the leftover tail on either side classified
/// per the contract above.
pub fn heap_diff<I: crate::index::FreeIndex>(
    heap: &crate::heap::Heap<I>,
    expected: &[ExpectedBlock],
    actual: &mut [ActualBlock],
) {
    let mut blocks = heap.iter_blocks();
    for (i, slot) in actual.iter_mut().enumerate() {
        let Some(block) = blocks.next() else {
            *slot = ActualBlock::OutOfBounds;
            continue;
        };
        let Some(exp) = expected.get(i) else {
            *slot = ActualBlock::HeapContinues;
            continue;
        };
        *slot = compare_one(block, exp);
    }
    // The segment outlived both slices: flag it even when expected.len() ==
    // actual.len(), not just when actual is the longer of the two.
    if blocks.next().is_some() {
        if let Some(last) = actual.last_mut() {
            *last = ActualBlock::HeapContinues;
        }
    }
}

fn compare_one(block: crate::block::BlockPtr, exp: &ExpectedBlock) -> ActualBlock {
    let address = block.client_space() as usize;
    let payload_bytes = block.size();

    if let Some(want_addr) = exp.address {
        if !block.is_alloc() || address != want_addr {
            return ActualBlock::Mismatch { address, payload_bytes };
        }
    } else if block.is_alloc() {
        // expected.address is null: spec.md requires the block to be free.
        return ActualBlock::Mismatch { address, payload_bytes };
    }

    if let Some(want_size) = exp.payload_bytes {
        if want_size != payload_bytes {
            return ActualBlock::Mismatch { address, payload_bytes };
        }
    }

    ActualBlock::Ok { address, payload_bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::index::seglist::SegList;

    #[test]
    fn matches_a_freshly_initialized_heap() {
        let mut seg = vec![0u8; 1024];
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };

        let expected = [ExpectedBlock { address: None, payload_bytes: Some(1008) }];
        let mut actual = [ActualBlock::OutOfBounds; 1];
        heap_diff(&heap, &expected, &mut actual);
        assert_eq!(actual[0], ActualBlock::Ok { address: heap.base() as usize + 8, payload_bytes: 1008 });
    }

    #[test]
    fn flags_mismatched_allocation_state() {
        let mut seg = vec![0u8; 1024];
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        let p = heap.malloc(40);

        // Covers both the allocation and the trailing free block left in
        // the segment, so the mismatch below isn't masked by HeapContinues.
        let expected = [
            ExpectedBlock { address: None, payload_bytes: None },
            ExpectedBlock { address: None, payload_bytes: None },
        ];
        let mut actual = [ActualBlock::OutOfBounds; 2];
        heap_diff(&heap, &expected, &mut actual);
        assert!(matches!(actual[0], ActualBlock::Mismatch { .. }));
        assert!(!p.is_null());
    }

    #[test]
    fn shorter_expected_list_reports_heap_continues() {
        let mut seg = vec![0u8; 1024];
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        heap.malloc(40);

        let expected = [ExpectedBlock { address: None, payload_bytes: None }];
        let mut actual = [ActualBlock::OutOfBounds; 2];
        heap_diff(&heap, &expected, &mut actual);
        assert!(matches!(actual[1], ActualBlock::HeapContinues));
    }

    #[test]
    fn equal_length_lists_still_flag_a_longer_segment() {
        let mut seg = vec![0u8; 1024];
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        heap.malloc(40);

        // One free block trails the allocation, but `expected`/`actual` are
        // both sized to cover only the allocation itself.
        let expected = [ExpectedBlock { address: None, payload_bytes: None }];
        let mut actual = [ActualBlock::OutOfBounds; 1];
        heap_diff(&heap, &expected, &mut actual);
        assert!(matches!(actual[0], ActualBlock::HeapContinues));
    }

    #[test]
    fn longer_expected_list_reports_out_of_bounds() {
        let mut seg = vec![0u8; 1024];
        let mut heap = Heap::<SegList>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };

        let expected = [
            ExpectedBlock { address: None, payload_bytes: Some(1008) },
            ExpectedBlock { address: None, payload_bytes: None },
        ];
        let mut actual = [ActualBlock::OutOfBounds; 2];
        heap_diff(&heap, &expected, &mut actual);
        assert!(matches!(actual[1], ActualBlock::OutOfBounds));
    }
}
