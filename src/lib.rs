//! # Soft Heap
//!
//! An approximate min-priority queue. Given an error parameter `epsilon` in
//! `(0, 1)`, a [`SoftHeap`] guarantees that across any sequence of
//! operations containing `n` inserts, at most `floor(epsilon * n)` items are
//! ever returned with a "corrupted" working priority greater than the
//! priority they were inserted with. In exchange it offers amortized `O(1)`
//! [`SoftHeap::insert`] and [`SoftHeap::meld`], and amortized `O(1)`
//! [`SoftHeap::extract_min`]. The construction follows the Kaplan-Zwick
//! binary-tree variant of the soft heap.
//!
//! Setting `epsilon` arbitrarily close to `0` (e.g. `1 / n` for `n` inserts)
//! makes every extraction exact, turning repeated insert/extract-min into a
//! comparison sort; larger `epsilon` trades a bounded amount of ordering
//! error for a smaller `r(epsilon)` and thus cheaper melds.

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    broken_intra_doc_links
)]

mod error;
mod softheap;

pub use error::SoftHeapError;
pub use softheap::{MeldError, SoftHeap};
