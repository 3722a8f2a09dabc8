//! Job launching strategy.
//!
//! Local subprocess and remote runner are two variants of one capability:
//! start a job for a topic and hand back a [`JobHandle`] carrying its progress.
//! The variant is chosen once, from configuration, at startup.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::handle::JobHandle;
use super::local::LocalJobLauncher;
use super::remote::RemoteJobLauncher;
use super::signal::{JobRequest, JobStatus};
use crate::config::Config;
use crate::kernel::env_resolver::JobEnv;

/// Fatal, per-run launch failures.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no runnable backend (tried: {})", .attempted.join(", "))]
    NoRunnableBackend { attempted: Vec<String> },

    #[error("remote job runner unreachable: {0}")]
    RemoteUnavailable(String),

    #[error("remote job runner returned HTTP {status}")]
    RemoteStatus { status: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    Local,
    Remote,
}

#[async_trait]
pub trait BaseJobLauncher: Send + Sync {
    fn mode(&self) -> LaunchMode;

    /// Start a job and return the handle its progress streams through.
    async fn launch(&self, request: &JobRequest, env: &JobEnv) -> Result<JobHandle, LaunchError>;

    /// Start a job nobody streams. Returns the acknowledgement body.
    async fn submit(
        &self,
        request: &JobRequest,
        env: &JobEnv,
    ) -> Result<serde_json::Value, LaunchError> {
        let handle = self.launch(request, env).await?;
        tokio::spawn(async move {
            let terminal = handle.drain().await;
            tracing::info!(?terminal, "Detached job finished");
        });

        Ok(serde_json::json!({ "status": JobStatus::Running }))
    }
}

/// Pick the launcher for this process: remote when a runner address is set.
pub fn create_job_launcher(config: &Config) -> Arc<dyn BaseJobLauncher> {
    match &config.job_runner_url {
        Some(base_url) => {
            tracing::info!(base_url = %base_url, "Jobs run on remote runner");
            Arc::new(RemoteJobLauncher::new(base_url.clone()))
        }
        None => {
            tracing::info!(workdir = %config.job_workdir.display(), "Jobs run as local subprocesses");
            Arc::new(LocalJobLauncher::from_config(config))
        }
    }
}
