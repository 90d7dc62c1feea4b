//! Cooperative cancellation for pipeline runs.
//!
//! A run may be superseded before it finishes (e.g. the user switches
//! jurisdiction mid-fetch). Each run owns a [`CancelToken`]; the page and
//! batch loops check it between requests so stale runs stop issuing work
//! and their partial results are discarded instead of racing newer output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cheaply cloneable cancellation flag shared by one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the run as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any
    /// clone of this token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
