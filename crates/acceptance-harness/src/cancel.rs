// crates/acceptance-harness/src/cancel.rs
// ============================================================================
// Module: Cancellation
// Description: Shared cancellation flag observed by blocking waits.
// Purpose: Let a caller abort container launch and readiness waits.
// ============================================================================

//! Cancellation token.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Cloneable cancellation flag.
///
/// Waits in the harness poll the flag between bounded sleeps, so a cancel is
/// observed within one poll interval.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Shared flag; `true` once cancelled.
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
