//! Per-client run registry.
//!
//! At most one job is live per client context. Registering a new run first
//! terminates the previous one, so a client that restarts never leaves an
//! orphaned subprocess or remote connection behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Identifies one registered run, so a finished run never evicts its successor.
pub type RunId = u64;

struct LiveRun {
    id: RunId,
    terminator: CancellationToken,
}

/// Thread-safe, cloneable. Keyed by client identifier.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, LiveRun>>>,
    next_id: Arc<AtomicU64>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminate the client's current run, if any. Returns whether one was live.
    pub async fn terminate(&self, client: &str) -> bool {
        let previous = self.runs.write().await.remove(client);
        match previous {
            Some(run) if !run.terminator.is_cancelled() => {
                tracing::info!(client, run_id = run.id, "Terminating previous run");
                run.terminator.cancel();
                true
            }
            _ => false,
        }
    }

    /// Record the client's new run, terminating any run it replaces.
    pub async fn register(&self, client: &str, terminator: CancellationToken) -> RunId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut runs = self.runs.write().await;
        if let Some(previous) = runs.insert(client.to_string(), LiveRun { id, terminator }) {
            previous.terminator.cancel();
        }
        id
    }

    /// Forget a run that has ended. A newer run of the same client is kept.
    pub async fn release(&self, client: &str, run_id: RunId) -> bool {
        let mut runs = self.runs.write().await;
        if runs.get(client).is_some_and(|run| run.id == run_id) {
            runs.remove(client);
            true
        } else {
            false
        }
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
