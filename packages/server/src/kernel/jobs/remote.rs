//! Remote job runner launcher.
//!
//! The runner exposes `GET /run?topic=` (event stream) and `POST /run`
//! (submission). Streamed bodies are forwarded without re-encoding: the
//! runner's own framing is trusted as is.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;

use super::handle::JobHandle;
use super::launcher::{BaseJobLauncher, LaunchError, LaunchMode};
use super::signal::JobRequest;
use crate::kernel::env_resolver::JobEnv;

pub struct RemoteJobLauncher {
    http: Client,
    base_url: String,
}

impl RemoteJobLauncher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn run_url(&self) -> String {
        format!("{}/run", self.base_url)
    }
}

#[async_trait]
impl BaseJobLauncher for RemoteJobLauncher {
    fn mode(&self) -> LaunchMode {
        LaunchMode::Remote
    }

    async fn launch(&self, request: &JobRequest, _env: &JobEnv) -> Result<JobHandle, LaunchError> {
        let mut builder = self
            .http
            .get(self.run_url())
            .header(ACCEPT, "text/event-stream");
        if let Some(topic) = request.topic() {
            builder = builder.query(&[("topic", topic)]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LaunchError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LaunchError::RemoteStatus {
                status: status.as_u16(),
            });
        }

        tracing::info!(url = %self.run_url(), topic = ?request.topic(), "Remote job stream opened");
        Ok(JobHandle::passthrough(response.bytes_stream()))
    }

    async fn submit(
        &self,
        request: &JobRequest,
        _env: &JobEnv,
    ) -> Result<serde_json::Value, LaunchError> {
        let body = JobRequest::new(request.topic().map(str::to_string));

        let response = self
            .http
            .post(self.run_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| LaunchError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LaunchError::RemoteStatus {
                status: status.as_u16(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| LaunchError::RemoteUnavailable(format!("invalid response body: {}", e)))
    }
}
