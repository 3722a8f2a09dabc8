//! Generation jobs: requests, progress signals, handles and launchers.

pub mod handle;
pub mod launcher;
pub mod local;
pub mod remote;
pub mod signal;

pub use handle::{JobHandle, Transport, SIGNAL_CAPACITY};
pub use launcher::{create_job_launcher, BaseJobLauncher, LaunchError, LaunchMode};
pub use local::{Candidate, LocalJobLauncher};
pub use remote::RemoteJobLauncher;
pub use signal::{JobRequest, JobStatus, ProgressSignal, StatusPayload, TerminalMarker};
