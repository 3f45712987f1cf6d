//! Cooperative cancellation shared across workers.
//!
//! A single process-wide abort flag (set by the CLI's ctrl-c handler) is
//! passed explicitly into every operation that can suspend. Checkpoints are
//! before each mux run and before each segment fetch; an in-flight transfer
//! is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle to the shared abort flag. All clones observe the same
/// flag; triggering is one-way.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Workers stop at their next checkpoint.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
