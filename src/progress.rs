//! Per-step progress reporting for long-running match batches.
//!
//! Batch operations iterate candidates synchronously on the caller's
//! thread; the only feedback channel is an incremental `(completed, total)`
//! notification after each candidate. Progress reporting never changes
//! execution order and does not provide cancellation.

/// Receives incremental progress notifications from a batch operation.
///
/// Any `FnMut(usize, usize)` closure implements this trait, so callers can
/// pass `&mut |done, total| { ... }` directly.
pub trait Progress {
    /// Called once per candidate with `(completed, total)`.
    fn step(&mut self, completed: usize, total: usize);
}

/// No-op sink for callers that do not track progress.
pub struct NoProgress;

impl Progress for NoProgress {
    fn step(&mut self, _completed: usize, _total: usize) {}
}

impl<F: FnMut(usize, usize)> Progress for F {
    fn step(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}
