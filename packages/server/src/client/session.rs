//! One client-driven run: stream progress, then fetch and normalize artifacts.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;

use super::decoder::{EventStreamDecoder, StreamSignal, Termination};
use super::tracker::{CompletionTracker, CONNECTION_ERROR};
use super::ClientError;
use crate::domains::posts::{normalize, PostsDocument};
use crate::kernel::artifacts::{
    ArtifactAggregator, ArtifactNames, ArtifactPair, ArtifactSource, HttpArtifactSource,
};
use crate::kernel::jobs::JobRequest;

/// How long to keep reading trailing lines after the terminal signal.
const TRAILING_GRACE: Duration = Duration::from_secs(2);

/// How a run ended, as far as the client can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Completed,
    /// The job reported failure (launch failure, failed status, nonzero exit).
    Failed(String),
    /// The stream dropped before any terminal signal. Retryable.
    Disconnected(String),
}

/// Final state of a run, handed to the rendering layer.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    /// Plain log lines in arrival order.
    pub lines: Vec<String>,
    pub artifacts: ArtifactPair,
    /// `None` when the content artifact is absent or unrecognized; render
    /// `artifacts.content` as raw text in that case.
    pub document: Option<PostsDocument>,
}

impl RunOutcome {
    fn ended(state: RunState, lines: Vec<String>) -> Self {
        Self {
            state,
            lines,
            artifacts: ArtifactPair::default(),
            document: None,
        }
    }

    /// The error to show the user, if any.
    pub fn user_error(&self) -> Option<&str> {
        match &self.state {
            RunState::Completed => None,
            RunState::Failed(message) | RunState::Disconnected(message) => Some(message),
        }
    }
}

/// Drives runs against a server exposing `GET /run` and `GET /file/{name}`.
pub struct RunClient {
    http: Client,
    base_url: String,
    client_id: Option<String>,
    aggregator: ArtifactAggregator,
    names: ArtifactNames,
}

impl RunClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::new();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let source: Arc<dyn ArtifactSource> =
            Arc::new(HttpArtifactSource::with_client(http.clone(), base_url.clone()));

        Self {
            http,
            base_url,
            client_id: None,
            aggregator: ArtifactAggregator::new(source),
            names: ArtifactNames::default(),
        }
    }

    /// Identify this client so a new run replaces its previous one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Read artifacts from somewhere other than the server's `/file` endpoint.
    pub fn with_artifact_source(mut self, source: Arc<dyn ArtifactSource>) -> Self {
        self.aggregator = ArtifactAggregator::new(source);
        self
    }

    pub fn with_artifact_names(mut self, names: ArtifactNames) -> Self {
        self.names = names;
        self
    }

    async fn open(&self, request: &JobRequest) -> Result<EventStreamDecoder, ClientError> {
        let mut query = Vec::new();
        if let Some(topic) = request.topic() {
            query.push(("topic", topic));
        }
        if let Some(client_id) = &self.client_id {
            query.push(("client", client_id.as_str()));
        }

        let response = self
            .http
            .get(format!("{}/run", self.base_url))
            .header(ACCEPT, "text/event-stream")
            .query(&query)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        Ok(EventStreamDecoder::new(response.bytes_stream()))
    }

    /// Run one job to its end. `on_signal` sees every signal as it arrives.
    ///
    /// Never fails: launch failures, drops and artifact problems all land in
    /// the returned outcome.
    pub async fn run<F>(&self, request: &JobRequest, mut on_signal: F) -> RunOutcome
    where
        F: FnMut(&StreamSignal),
    {
        let tracker = CompletionTracker::new();
        let mut lines = Vec::new();

        let mut events = match self.open(request).await {
            Ok(events) => events,
            Err(e) => {
                let message = tracker
                    .transport_error(&e)
                    .unwrap_or_else(|| CONNECTION_ERROR.to_string());
                return RunOutcome::ended(RunState::Disconnected(message), lines);
            }
        };

        let mut termination = None;
        let mut transport_error = None;

        loop {
            let next = if tracker.is_latched() {
                // Trailing diagnostics only; close once the server goes quiet.
                match tokio::time::timeout(TRAILING_GRACE, events.next()).await {
                    Ok(next) => next,
                    Err(_) => break,
                }
            } else {
                events.next().await
            };
            let Some(event) = next else {
                break;
            };

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    transport_error = tracker.transport_error(&e);
                    break;
                }
            };

            let signal = StreamSignal::from_event(event);
            on_signal(&signal);

            if let StreamSignal::Line(text) = &signal {
                lines.push(text.clone());
            }
            if let Some(ending) = signal.termination() {
                // First terminal signal is authoritative.
                if tracker.latch() {
                    termination = Some(ending);
                } else {
                    tracing::debug!(?signal, "Ignoring repeated terminal signal");
                }
            }
        }

        match termination {
            Some(Termination::Completed) => self.collect(lines).await,
            Some(Termination::Failed(message)) => {
                RunOutcome::ended(RunState::Failed(message), lines)
            }
            None => {
                let message = transport_error
                    .or_else(|| tracker.transport_error("stream closed before the job finished"))
                    .unwrap_or_else(|| CONNECTION_ERROR.to_string());
                RunOutcome::ended(RunState::Disconnected(message), lines)
            }
        }
    }

    async fn collect(&self, lines: Vec<String>) -> RunOutcome {
        let artifacts = self.aggregator.fetch(&self.names).await;
        let document = artifacts.content.as_deref().and_then(normalize);

        tracing::info!(
            platforms = document.as_ref().map(PostsDocument::len),
            has_report = artifacts.report.is_some(),
            "Run completed"
        );

        RunOutcome {
            state: RunState::Completed,
            lines,
            artifacts,
            document,
        }
    }
}
