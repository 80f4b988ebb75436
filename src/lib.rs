//! `segheap` — a family of single-threaded, boundary-tag heap allocators
//! over a caller-supplied byte segment.
//!
//! Every variant shares the same block layout ([`block`]), the same
//! coalescer ([`coalesce`]), and the same duplicate-side-list trick
//! ([`duplist`]); they differ only in how free blocks are indexed
//! ([`index`]). [`heap::Heap`] ties a segment and an index variant together
//! behind one `init`/`malloc`/`realloc`/`free` surface; [`validate`],
//! [`diff`] and [`print`] are read-only diagnostics layered on top.
//!
//! ```
//! use segheap::heap::Heap;
//! use segheap::index::seglist::SegList;
//!
//! let mut segment = vec![0u8; 4096];
//! let mut heap = Heap::<SegList>::new();
//! unsafe { heap.init(segment.as_mut_ptr(), segment.len()) };
//!
//! let p = heap.malloc(128);
//! assert!(!p.is_null());
//! heap.free(p);
//! assert!(heap.validate());
//! ```
#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::missing_errors_doc)]

pub mod block;
pub mod coalesce;
pub mod config;
pub mod diff;
pub mod duplist;
pub mod error;
pub mod heap;
pub mod index;
pub mod print;
pub mod validate;

pub use error::HeapError;
pub use heap::{Heap, HeapStats};
