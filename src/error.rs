use thiserror::Error;

/// Errors produced by [`crate::SoftHeap`] operations.
///
/// [`crate::SoftHeap::meld`]'s epsilon-mismatch failure is not a variant
/// here: unlike these two, it must hand both input heaps back to the caller,
/// so it is reported through the dedicated [`crate::MeldError`] instead.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SoftHeapError {
    /// Construction was attempted with an `epsilon` outside `(0, 1)`.
    #[error("epsilon must lie in (0, 1), got {0}")]
    InvalidEpsilon(f64),

    /// An extract was attempted on an empty heap.
    #[error("cannot extract from an empty soft heap")]
    ExtractFromEmpty,
}
