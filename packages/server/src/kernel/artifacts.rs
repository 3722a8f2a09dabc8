//! Job output artifacts.
//!
//! A job writes two artifacts: a structured-content file (expected JSON) and a
//! free-text report (expected Markdown). They live either on the local
//! filesystem or behind a remote `GET /file/{name}` endpoint. Each half of a
//! pair is fetched independently; a failure leaves that half absent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref ARTIFACT_NAME: Regex =
        Regex::new(r"^[A-Za-z0-9._-]+\.(md|json|txt)$").expect("artifact name pattern is valid");
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact {name} fetch returned HTTP {status}")]
    Status { name: String, status: u16 },

    #[error("network error fetching {name}: {message}")]
    Network { name: String, message: String },

    #[error("failed to read {name}: {message}")]
    Io { name: String, message: String },
}

/// Reject, never sanitize: names outside the pattern are refused before any fetch.
pub fn validate_artifact_name(name: &str) -> Result<(), ArtifactError> {
    if ARTIFACT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ArtifactError::InvalidName(name.to_string()))
    }
}

/// Names of the two artifacts a job declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNames {
    pub content: String,
    pub report: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            content: "social_posts.json".to_string(),
            report: "report.md".to_string(),
        }
    }
}

/// A fetched artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub body: Bytes,
    /// Content type reported by the origin, if any.
    pub content_type: Option<String>,
}

impl Artifact {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Raw artifact texts, each independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPair {
    pub content: Option<String>,
    pub report: Option<String>,
    /// One line per failed fetch.
    pub diagnostics: Vec<String>,
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Artifact, ArtifactError>;
}

/// Artifacts in a local directory.
pub struct LocalArtifactSource {
    dir: PathBuf,
}

impl LocalArtifactSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactSource for LocalArtifactSource {
    async fn fetch(&self, name: &str) -> Result<Artifact, ArtifactError> {
        validate_artifact_name(name)?;

        match tokio::fs::read(self.dir.join(name)).await {
            Ok(body) => Ok(Artifact {
                body: Bytes::from(body),
                content_type: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(name.to_string()))
            }
            Err(e) => Err(ArtifactError::Io {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Artifacts served over HTTP at `{base_url}/file/{name}`.
pub struct HttpArtifactSource {
    http: Client,
    base_url: String,
}

impl HttpArtifactSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, name: &str) -> Result<Artifact, ArtifactError> {
        validate_artifact_name(name)?;

        let network = |e: reqwest::Error| ArtifactError::Network {
            name: name.to_string(),
            message: e.to_string(),
        };

        let response = self
            .http
            .get(format!("{}/file/{}", self.base_url, name))
            .send()
            .await
            .map_err(network)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(ArtifactError::NotFound(name.to_string())),
            status => {
                return Err(ArtifactError::Status {
                    name: name.to_string(),
                    status: status.as_u16(),
                })
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(network)?;

        Ok(Artifact { body, content_type })
    }
}

/// Fetches a job's artifact pair after it completes.
#[derive(Clone)]
pub struct ArtifactAggregator {
    source: Arc<dyn ArtifactSource>,
}

impl ArtifactAggregator {
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self { source }
    }

    /// Fetch both halves concurrently. Never fails as a whole.
    pub async fn fetch(&self, names: &ArtifactNames) -> ArtifactPair {
        let (content, report) = tokio::join!(
            self.fetch_text(&names.content),
            self.fetch_text(&names.report)
        );

        let mut pair = ArtifactPair::default();
        match content {
            Ok(text) => pair.content = Some(text),
            Err(line) => pair.diagnostics.push(line),
        }
        match report {
            Ok(text) => pair.report = Some(text),
            Err(line) => pair.diagnostics.push(line),
        }
        pair
    }

    async fn fetch_text(&self, name: &str) -> Result<String, String> {
        self.source.fetch(name).await.map(|a| a.text()).map_err(|e| {
            tracing::warn!(artifact = name, error = %e, "Artifact fetch failed");
            e.to_string()
        })
    }
}

/// Report whether each declared artifact exists under `dir` right now.
pub fn artifact_diagnostics(dir: &Path, names: &ArtifactNames) -> Vec<String> {
    [("content", &names.content), ("report", &names.report)]
        .into_iter()
        .map(|(kind, name)| {
            let state = if dir.join(name).is_file() {
                "present"
            } else {
                "missing"
            };
            format!("{} artifact {}: {}", kind, name, state)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_validation() {
        for name in ["social_posts.json", "report.md", "run-2.log.txt", "A.B_c-d.json"] {
            assert!(validate_artifact_name(name).is_ok(), "{name} should be valid");
        }
        for name in [
            "../secrets.json",
            "report.html",
            "report",
            "nested/report.md",
            "report.md ",
            "",
            "report.md.exe",
        ] {
            assert!(validate_artifact_name(name).is_err(), "{name} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_missing_half_does_not_block_other() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.md"), "# Report").unwrap();

        let aggregator = ArtifactAggregator::new(Arc::new(LocalArtifactSource::new(dir.path())));
        let pair = aggregator.fetch(&ArtifactNames::default()).await;

        assert_eq!(pair.content, None);
        assert_eq!(pair.report.as_deref(), Some("# Report"));
        assert_eq!(
            pair.diagnostics,
            vec!["artifact not found: social_posts.json".to_string()]
        );
    }

    #[tokio::test]
    async fn test_local_source_rejects_invalid_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalArtifactSource::new(dir.path());

        let err = source.fetch("../etc/passwd.txt").await.unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidName(_)));
    }

    #[test]
    fn test_artifact_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("social_posts.json"), "{}").unwrap();

        let lines = artifact_diagnostics(dir.path(), &ArtifactNames::default());

        assert_eq!(
            lines,
            vec![
                "content artifact social_posts.json: present".to_string(),
                "report artifact report.md: missing".to_string(),
            ]
        );
    }
}
