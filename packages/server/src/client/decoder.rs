//! Event stream decoder.
//!
//! Converts a raw byte stream into server events, then classifies each event
//! as a log line, a status update, or a terminal signal. Completion can arrive
//! either as an inline `{"status": "completed"}` payload or as a named
//! `event: done`; both are recognized.

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use super::ClientError;

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerEvent {
    /// Event name; `None` for the default `message` event.
    pub event: Option<String>,
    /// Data lines joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: Vec<String>,
}

impl PendingEvent {
    /// Feed one line. Returns an event when a blank line dispatches one.
    fn feed(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id, retry and unknown fields carry nothing we use
            _ => {}
        }
        None
    }

    fn take(&mut self) -> Option<ServerEvent> {
        if self.data.is_empty() && self.event.is_none() {
            return None;
        }
        let pending = std::mem::take(self);
        Some(ServerEvent {
            event: pending.event,
            data: pending.data.join("\n"),
        })
    }
}

/// Stream adapter that converts raw bytes into [`ServerEvent`] values.
pub struct EventStreamDecoder {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>,
    buffer: Vec<u8>,
    pending: PendingEvent,
    finished: bool,
}

impl EventStreamDecoder {
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display,
    {
        Self {
            inner: Box::pin(
                byte_stream.map(|chunk| chunk.map_err(|e| ClientError::Network(e.to_string()))),
            ),
            buffer: Vec::new(),
            pending: PendingEvent::default(),
            finished: false,
        }
    }

    /// Dispatch the next complete event already in the buffer.
    fn next_buffered(&mut self) -> Option<ServerEvent> {
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if let Some(event) = self.pending.feed(line) {
                return Some(event);
            }
        }
        None
    }
}

impl Stream for EventStreamDecoder {
    type Item = Result<ServerEvent, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.next_buffered() {
                return Poll::Ready(Some(Ok(event)));
            }

            if this.finished {
                // Stream ended: an unterminated final event still counts
                return Poll::Ready(this.pending.take().map(Ok));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    this.buffer.clear();
                    this.pending = PendingEvent::default();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    if !this.buffer.is_empty() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// What an event means to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// Plain log line.
    Line(String),
    /// Inline status payload.
    Status {
        status: String,
        message: Option<String>,
    },
    /// `event: done` with the job's exit code, when parseable.
    Done { code: Option<i32> },
    /// `event: error` with its message.
    Error(String),
}

/// How a terminal signal ended the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Failed(String),
}

impl StreamSignal {
    /// Classify an event. Data that is not a JSON status object is a plain line.
    pub fn from_event(event: ServerEvent) -> Self {
        match event.event.as_deref() {
            Some("done") => StreamSignal::Done {
                code: event.data.trim().parse().ok(),
            },
            Some("error") => StreamSignal::Error(event.data),
            _ => match parse_status(&event.data) {
                Some((status, message)) => StreamSignal::Status { status, message },
                None => StreamSignal::Line(event.data),
            },
        }
    }

    /// `Some` for terminal signals.
    pub fn termination(&self) -> Option<Termination> {
        match self {
            StreamSignal::Line(_) => None,
            StreamSignal::Done { code: Some(0) | None } => Some(Termination::Completed),
            StreamSignal::Done { code: Some(code) } => {
                Some(Termination::Failed(format!("job exited with code {}", code)))
            }
            StreamSignal::Error(message) => Some(Termination::Failed(message.clone())),
            StreamSignal::Status { status, message } => match status.as_str() {
                "completed" => Some(Termination::Completed),
                "failed" | "error" => Some(Termination::Failed(
                    message.clone().unwrap_or_else(|| "job failed".to_string()),
                )),
                _ => None,
            },
        }
    }
}

fn parse_status(data: &str) -> Option<(String, Option<String>)> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let status = value.get("status")?.as_str()?.to_string();
    let message = value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string);
    Some((status, message))
}
