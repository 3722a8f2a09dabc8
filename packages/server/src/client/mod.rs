//! Client side of a run: consume the event stream, decide how the job ended,
//! then fetch and normalize its artifacts.

pub mod decoder;
pub mod session;
pub mod tracker;

use thiserror::Error;

pub use decoder::{EventStreamDecoder, ServerEvent, StreamSignal, Termination};
pub use session::{RunClient, RunOutcome, RunState};
pub use tracker::{CompletionTracker, CONNECTION_ERROR};

/// Transport-level client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned HTTP {0}")]
    Status(u16),
}
