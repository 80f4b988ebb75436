//! Component H: the pretty printer (spec.md 4.H / §6 `dump_heap` and
//! `print_free_nodes`). Neither function mutates any state (spec.md §5:
//! "the pretty-printer and dumper mutate no state and are safe to call
//! between mutations").

use crate::index::FreeIndex;

/// Rendering style for [`crate::heap::Heap::print_free_nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// A bare list of free sizes.
    Plain,
    /// Sizes annotated with bucket/color/duplicate-count structure.
    Verbose,
}

/// One line per block, in segment order: address, payload size, and
/// allocation state; free blocks additionally show the left-alloc mirror
/// bit since that is the one piece of state a reader can't infer from
/// neighboring lines alone.
pub fn dump_heap<I: FreeIndex>(heap: &crate::heap::Heap<I>, w: &mut dyn core::fmt::Write) -> core::fmt::Result {
    writeln!(w, "heap [{:#x}, {:#x}) variant={}", heap.base(), heap.end(), I::NAME)?;
    for block in heap.iter_blocks() {
        let state = if block.is_alloc() { "alloc" } else { "free" };
        writeln!(
            w,
            "  {:#010x} size={:<6} {} left_alloc={}",
            block.addr(),
            block.size(),
            state,
            block.left_alloc() as u8,
        )?;
    }
    writeln!(w, "  {:#010x} end-sentinel", heap.sentinel().addr())
}

/// Render the free-block index's own view (delegates to the variant's
/// `FreeIndex::dump`, which knows its own internal shape).
pub fn print_free_nodes<I: FreeIndex>(
    index: &I,
    w: &mut dyn core::fmt::Write,
    style: Style,
) -> core::fmt::Result {
    writeln!(w, "free-nodes variant={} count={}", I::NAME, index.free_entry_count())?;
    index.dump(w, style == Style::Verbose)?;
    writeln!(w)
}
