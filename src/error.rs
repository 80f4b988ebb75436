//! Error taxonomy for the slower, diagnostic-facing operations.
//!
//! `malloc`/`realloc`/`free` never return this type — per spec.md §7 their
//! failures are in-band (a null pointer). `HeapError` backs `init_checked`,
//! `validate`, and `heap_diff`, where a caller debugging a broken heap
//! benefits from knowing *which* invariant broke.

/// Failure reasons for heap construction and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// `init` was given a segment too small to hold a minimum block plus
    /// the end sentinel.
    #[error("segment of {given} bytes is too small to hold a minimum block ({needed} bytes required)")]
    InitTooSmall { given: usize, needed: usize },

    /// A request exceeded [`crate::config::MAX_REQUEST`]. `malloc`/`realloc`
    /// report this in-band as a null pointer; it only surfaces here when a
    /// diagnostic caller asks `Heap` to explain a null result.
    #[error("requested {requested} bytes exceeds the {limit}-byte request cap")]
    InvalidRequest { requested: usize, limit: usize },

    /// No free block large enough was found. Same in-band-vs-diagnostic
    /// split as `InvalidRequest`.
    #[error("no free block of at least {requested} bytes is available")]
    OutOfMemory { requested: usize },

    /// The validator detected a broken invariant. Debug builds only, per
    /// spec.md §7 ("in release builds, behavior is undefined").
    #[error("heap corruption detected: {0}")]
    CorruptHeap(&'static str),
}
