//! Job requests and the progress signals a running job emits.

use serde::{Deserialize, Serialize};

/// A request to start one generation job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl JobRequest {
    pub fn new(topic: Option<String>) -> Self {
        Self { topic }
    }

    /// The topic to pass downstream. Absent and blank topics are the same:
    /// the job falls back to its own default.
    pub fn topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
    }
}

/// Job state carried by a structured status signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Wire payload of a status signal: `{"status": ..., "message"?: ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalMarker {
    /// The job process exited. `-1` when no exit code is available.
    Exited { code: i32 },
    /// The job could not run or was reported failed.
    Failed { message: String },
}

/// One unit of progress information about a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSignal {
    RawLine(String),
    Status(StatusPayload),
    Terminal(TerminalMarker),
}

impl ProgressSignal {
    pub fn line(text: impl Into<String>) -> Self {
        ProgressSignal::RawLine(text.into())
    }

    pub fn status(status: JobStatus, message: Option<String>) -> Self {
        ProgressSignal::Status(StatusPayload { status, message })
    }

    pub fn exited(code: i32) -> Self {
        ProgressSignal::Terminal(TerminalMarker::Exited { code })
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ProgressSignal::Terminal(TerminalMarker::Failed {
            message: message.into(),
        })
    }

    /// Whether this signal ends the job (success or failure).
    pub fn is_terminal(&self) -> bool {
        match self {
            ProgressSignal::RawLine(_) => false,
            ProgressSignal::Status(payload) => payload.status.is_terminal(),
            ProgressSignal::Terminal(_) => true,
        }
    }

    /// Whether this signal ends the job with an error. The stream closes right
    /// after an error is written.
    pub fn is_error(&self) -> bool {
        match self {
            ProgressSignal::RawLine(_) => false,
            ProgressSignal::Status(payload) => payload.status == JobStatus::Failed,
            ProgressSignal::Terminal(TerminalMarker::Failed { .. }) => true,
            ProgressSignal::Terminal(TerminalMarker::Exited { .. }) => false,
        }
    }
}
