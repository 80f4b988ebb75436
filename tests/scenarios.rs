//! Integration tests encoding spec.md §8's literal scenarios S1-S6 and
//! properties P1-P9/R1-R4, run against every `FreeIndex` variant through
//! one small parameterized helper so a regression in any single variant's
//! bookkeeping shows up here rather than only in its own unit tests.

use segheap::block::WORD;
use segheap::heap::Heap;
use segheap::index::rbtree::{clrs::Clrs, stacked::Stacked, topdown::Topdown as RbTopdown, unified::Unified};
use segheap::index::seglist::SegList;
use segheap::index::splay::{bottomup::BottomUp, topdown::Topdown as SplayTopdown};
use segheap::index::FreeIndex;

/// Drive `$body` against a fresh `$seg_bytes`-byte segment for every index
/// variant in turn, naming the variant in every assertion's failure
/// message via `I::NAME`.
macro_rules! for_all_variants {
    ($name:ident, $seg_bytes:expr, |$heap:ident : Heap<$I:ident>| $body:block) => {
        #[test]
        fn $name() {
            fn check<$I: FreeIndex>() {
                let mut seg = vec![0u8; $seg_bytes];
                let mut $heap = Heap::<$I>::new();
                assert!(unsafe { $heap.init(seg.as_mut_ptr(), seg.len()) });
                $body
            }
            check::<SegList>();
            check::<Clrs>();
            check::<Unified>();
            check::<Stacked>();
            check::<RbTopdown>();
            check::<BottomUp>();
            check::<SplayTopdown>();
        }
    };
}

for_all_variants!(s1_init_capacity_and_free_total, 1024, |heap: Heap<I>| {
    assert_eq!(heap.capacity(), 1008, "{}", I::NAME);
    assert_eq!(heap.get_free_total(), 1, "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);
});

for_all_variants!(s2_malloc_splits_remainder, 1024, |heap: Heap<I>| {
    let p1 = heap.malloc(40);
    assert!(!p1.is_null(), "{}", I::NAME);
    assert_eq!(heap.get_free_total(), 1, "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);
});

for_all_variants!(s3_full_coalesce_after_freeing_both_neighbors, 1024, |heap: Heap<I>| {
    let p1 = heap.malloc(40);
    let p2 = heap.malloc(40);
    heap.free(p1);
    heap.free(p2);
    assert_eq!(heap.capacity(), 1008, "{}", I::NAME);
    assert_eq!(heap.get_free_total(), 1, "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);
});

for_all_variants!(s4_realloc_grows_in_place_and_preserves_data, 1024, |heap: Heap<I>| {
    let p = heap.malloc(100);
    unsafe {
        core::ptr::write_bytes(p, 0x5A, 100);
    }
    let q = unsafe { heap.realloc(p, 200) };
    assert_eq!(q, p, "{}", I::NAME);
    let bytes = unsafe { core::slice::from_raw_parts(q, 100) };
    assert!(bytes.iter().all(|&b| b == 0x5A), "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);
});

for_all_variants!(s5_duplicate_size_then_full_coalesce, 1024, |heap: Heap<I>| {
    // A fourth, trailing block absorbs whatever remainder the segment has
    // left over so freeing C can't right-coalesce into it — otherwise C's
    // free would immediately fuse with that remainder instead of standing
    // alone as a same-size duplicate of A, which is what spec.md's S5
    // assumes a tightly-sized segment guarantees.
    let a = heap.malloc(40);
    let b = heap.malloc(40);
    let c = heap.malloc(40);
    let remainder = heap.capacity();
    let d = heap.malloc(remainder);
    assert!(!a.is_null() && !b.is_null() && !c.is_null() && !d.is_null(), "{}", I::NAME);

    heap.free(a);
    heap.free(c);
    assert!(heap.validate(), "{}", I::NAME);
    // a and c are now two free blocks of the same size, separated by the
    // still-allocated b: representative + one duplicate on tree/splay
    // variants, two bucket entries on the segregated list.
    assert_eq!(heap.get_free_total(), 2, "{}", I::NAME);

    heap.free(b);
    assert_eq!(heap.get_free_total(), 1, "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);

    heap.free(d);
    assert_eq!(heap.capacity(), 1008, "{}", I::NAME);
    assert_eq!(heap.get_free_total(), 1, "{}", I::NAME);
});

for_all_variants!(s6_exhaustion_then_recovery, 256, |heap: Heap<I>| {
    let mut live = vec![];
    loop {
        let p = heap.malloc(24);
        if p.is_null() {
            break;
        }
        live.push(p);
    }
    assert!(heap.malloc(24).is_null(), "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);

    let freed = live.pop().unwrap();
    heap.free(freed);
    assert!(!heap.malloc(24).is_null(), "{}", I::NAME);
});

// R1: any sequence of mallocs followed by frees (any order) restores the
// post-init capacity.
for_all_variants!(r1_malloc_then_free_any_order_restores_capacity, 4096, |heap: Heap<I>| {
    let after_init = heap.capacity();
    let sizes = [16usize, 500, 33, 900, 64, 128];
    let mut ptrs: Vec<*mut u8> = sizes.iter().map(|&n| heap.malloc(n)).collect();
    assert!(ptrs.iter().all(|p| !p.is_null()), "{}", I::NAME);
    // free in reverse order
    while let Some(p) = ptrs.pop() {
        heap.free(p);
    }
    assert_eq!(heap.capacity(), after_init, "{}", I::NAME);
    assert!(heap.validate(), "{}", I::NAME);
});

// R2: free(malloc(n)) then malloc(n) succeeds with payload >= round_up(n).
for_all_variants!(r2_free_then_realloc_same_size_succeeds, 2048, |heap: Heap<I>| {
    let want = heap.heap_align(77);
    let p = heap.malloc(77);
    assert!(!p.is_null(), "{}", I::NAME);
    heap.free(p);
    let q = heap.malloc(77);
    assert!(!q.is_null(), "{}", I::NAME);
    let block_payload = unsafe {
        let bp = segheap::block::BlockPtr::from_client_ptr(q);
        bp.size()
    };
    assert!(block_payload >= want, "{}", I::NAME);
});

// R3: realloc(p, size(p)) returns p unchanged and does not move data.
for_all_variants!(r3_realloc_same_size_is_a_noop, 1024, |heap: Heap<I>| {
    let p = heap.malloc(64);
    let size_of_p = unsafe { segheap::block::BlockPtr::from_client_ptr(p).size() };
    let q = unsafe { heap.realloc(p, size_of_p) };
    assert_eq!(p, q, "{}", I::NAME);
});

// R4: validate() holds at every quiescent point in a longer scripted
// sequence of operations.
for_all_variants!(r4_validate_holds_across_a_scripted_sequence, 4096, |heap: Heap<I>| {
    let mut live: Vec<*mut u8> = vec![];
    let script = [
        Op::Malloc(32),
        Op::Malloc(64),
        Op::Malloc(32),
        Op::FreeIndex(0),
        Op::Malloc(96),
        Op::FreeIndex(1),
        Op::Malloc(16),
        Op::FreeIndex(0),
        Op::FreeIndex(0),
        Op::FreeIndex(0),
    ];
    for op in script {
        match op {
            Op::Malloc(n) => {
                let p = heap.malloc(n);
                if !p.is_null() {
                    live.push(p);
                }
            }
            Op::FreeIndex(i) => {
                if i < live.len() {
                    let p = live.remove(i);
                    heap.free(p);
                }
            }
        }
        assert!(heap.validate(), "{} after {:?}", I::NAME, op);
    }
});

#[derive(Debug, Clone, Copy)]
enum Op {
    Malloc(usize),
    FreeIndex(usize),
}

#[test]
fn heap_align_matches_round_up_across_variants() {
    fn check<I: FreeIndex>() {
        let mut seg = vec![0u8; 1024];
        let mut heap = Heap::<I>::new();
        unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
        assert_eq!(heap.heap_align(1), segheap::block::round_up(1, I::MIN_BLOCK_SIZE));
        assert_eq!(heap.heap_align(I::MIN_BLOCK_SIZE + 1), segheap::block::round_up(I::MIN_BLOCK_SIZE + 1, I::MIN_BLOCK_SIZE));
    }
    check::<SegList>();
    check::<Clrs>();
    check::<Unified>();
    check::<Stacked>();
    check::<RbTopdown>();
    check::<BottomUp>();
    check::<SplayTopdown>();
}

// Randomized stress test: a long, seeded sequence of interleaved
// malloc/free calls with varied sizes should never break validate() and
// should always fully reclaim capacity once every live pointer is freed
// (R1/R4 under traffic less scripted than the scenarios above).
fn for_all_variants_fuzz<I: FreeIndex>(seed: u64) {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    let mut seg = vec![0u8; 65_536];
    let mut heap = Heap::<I>::new();
    assert!(unsafe { heap.init(seg.as_mut_ptr(), seg.len()) }, "{}", I::NAME);
    let after_init = heap.capacity();

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut live: Vec<*mut u8> = vec![];
    for _ in 0..500 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let n = rng.gen_range(1..=800);
            let p = heap.malloc(n);
            if !p.is_null() {
                live.push(p);
            }
        } else {
            let i = rng.gen_range(0..live.len());
            heap.free(live.swap_remove(i));
        }
        assert!(heap.validate(), "{} seed={seed}", I::NAME);
    }
    for p in live.drain(..) {
        heap.free(p);
    }
    assert_eq!(heap.capacity(), after_init, "{} seed={seed}", I::NAME);
    assert!(heap.validate(), "{} seed={seed}", I::NAME);
}

#[test]
fn fuzz_interleaved_malloc_free_across_variants() {
    for seed in [1u64, 2, 42, 1337] {
        for_all_variants_fuzz::<SegList>(seed);
        for_all_variants_fuzz::<Clrs>(seed);
        for_all_variants_fuzz::<Unified>(seed);
        for_all_variants_fuzz::<Stacked>(seed);
        for_all_variants_fuzz::<RbTopdown>(seed);
        for_all_variants_fuzz::<BottomUp>(seed);
        for_all_variants_fuzz::<SplayTopdown>(seed);
    }
}

#[test]
fn stats_report_consistent_totals() {
    let mut seg = vec![0u8; 2048];
    let mut heap = Heap::<SegList>::new();
    unsafe { heap.init(seg.as_mut_ptr(), seg.len()) };
    let p = heap.malloc(64);
    assert!(!p.is_null());
    let stats = heap.stats();
    assert_eq!(stats.free_bytes, heap.capacity());
    assert_eq!(stats.free_blocks, heap.get_free_total());
    assert!(stats.total_bytes >= stats.free_bytes + WORD);
}
