// Postcast - Core
//
// Bridges a "generate social content for topic X" request to a long-running
// generation job, streams the job's progress to the caller, and normalizes the
// job's output artifacts into a display-ready posts document.

pub mod client;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
