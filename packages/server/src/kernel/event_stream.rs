//! Outbound event stream encoding.
//!
//! Framing:
//!   plain line      `data: <text>\n\n`
//!   status          `data: {"status": ..., "message"?: ...}\n\n`
//!   process exit    `event: done\ndata: <exit code>\n\n`
//!   failure         `event: error\ndata: <message>\n\n`
//!
//! Remote runner bodies are forwarded byte for byte.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::jobs::{JobHandle, ProgressSignal, TerminalMarker, Transport};

/// Turn a job handle into the long-lived response streaming its progress.
pub fn into_response(handle: JobHandle) -> Response {
    let (transport, terminator) = handle.into_parts();

    match transport {
        Transport::Signals(rx) => Sse::new(encode_signals(rx, terminator))
            .keep_alive(KeepAlive::default())
            .into_response(),
        Transport::Passthrough(body) => {
            let body = body.take_until(terminator.cancelled_owned());
            let mut response = Body::from_stream(body).into_response();
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
    }
}

/// Encode signals in arrival order.
///
/// Ends after an error is written, when the producer finishes, or when the
/// job is terminated. Once a terminal signal has been written only trailing
/// plain lines pass; a second terminal signal is dropped. A client that goes
/// away simply drops this stream.
pub fn encode_signals(
    mut rx: mpsc::Receiver<ProgressSignal>,
    terminator: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut terminal_seen = false;

        loop {
            let signal = tokio::select! {
                biased;
                _ = terminator.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
            };

            if terminal_seen && !matches!(signal, ProgressSignal::RawLine(_)) {
                tracing::debug!(?signal, "Ignoring signal after terminal");
                continue;
            }
            terminal_seen |= signal.is_terminal();
            let closes = signal.is_error();

            yield Ok(signal_event(&signal));

            if closes {
                break;
            }
        }
    }
}

/// The event for a single signal.
pub fn signal_event(signal: &ProgressSignal) -> Event {
    match signal {
        ProgressSignal::RawLine(text) => Event::default().data(field_safe(text)),
        ProgressSignal::Status(payload) => {
            let json = serde_json::to_string(payload)
                .unwrap_or_else(|_| format!(r#"{{"status":"{:?}"}}"#, payload.status));
            Event::default().data(json)
        }
        ProgressSignal::Terminal(TerminalMarker::Exited { code }) => {
            Event::default().event("done").data(code.to_string())
        }
        ProgressSignal::Terminal(TerminalMarker::Failed { message }) => {
            Event::default().event("error").data(field_safe(message))
        }
    }
}

// Event fields cannot carry carriage returns.
fn field_safe(text: &str) -> String {
    text.replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::JobStatus;

    async fn encoded(signals: Vec<ProgressSignal>) -> Vec<Event> {
        let (tx, rx) = mpsc::channel(signals.len().max(1));
        for signal in signals {
            tx.send(signal).await.unwrap();
        }
        drop(tx);

        encode_signals(rx, CancellationToken::new())
            .map(|event| event.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_stream_closes_after_error() {
        let events = encoded(vec![
            ProgressSignal::line("starting"),
            ProgressSignal::failed("boom"),
            ProgressSignal::line("never sent"),
        ])
        .await;

        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_trailing_lines_pass_but_second_terminal_is_dropped() {
        let events = encoded(vec![
            ProgressSignal::exited(0),
            ProgressSignal::line("content artifact social_posts.json: present"),
            ProgressSignal::status(JobStatus::Completed, None),
            ProgressSignal::line("report artifact report.md: present"),
        ])
        .await;

        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_terminated_stream_stops() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(ProgressSignal::line("one")).await.unwrap();
        let terminator = CancellationToken::new();
        terminator.cancel();

        let events: Vec<_> = encode_signals(rx, terminator).collect().await;

        assert!(events.is_empty());
        drop(tx);
    }

    #[test]
    fn test_field_safe_strips_carriage_returns() {
        assert_eq!(field_safe("50%\r75%\r100%"), "50%75%100%");
    }
}
