//! Completion latch.
//!
//! Closing an event stream on purpose after the terminal signal produces the
//! same transport notification as a dropped connection. The latch records
//! that the job reached a terminal state so the former is not reported as an
//! error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Message shown when the stream drops before the job finished.
pub const CONNECTION_ERROR: &str = "Connection error, please retry";

/// Write-once boolean latch. Clones share the same latch.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    latched: Arc<AtomicBool>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch on a terminal signal. Returns `true` only for the call that
    /// actually latched; later calls are no-ops.
    pub fn latch(&self) -> bool {
        !self.latched.swap(true, Ordering::SeqCst)
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::SeqCst)
    }

    /// The user-visible error for a transport error, if any. Suppressed once
    /// the job reached a terminal state.
    pub fn transport_error(&self, cause: impl std::fmt::Display) -> Option<String> {
        if self.is_latched() {
            tracing::debug!(%cause, "Transport closed after completion");
            None
        } else {
            tracing::warn!(%cause, "Transport closed before completion");
            Some(format!("{}: {}", CONNECTION_ERROR, cause))
        }
    }
}
