//! Job handles: one live transport per launched job.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::signal::ProgressSignal;

/// Signals buffered per job before the producer waits on the consumer.
pub const SIGNAL_CAPACITY: usize = 256;

/// The transport a job's progress arrives on.
pub enum Transport {
    /// Signals produced in-process (local subprocess, launch failures).
    Signals(mpsc::Receiver<ProgressSignal>),
    /// An already-framed event stream from a remote runner, forwarded verbatim.
    Passthrough(BoxStream<'static, Result<Bytes, reqwest::Error>>),
}

/// Opaque reference to a running job.
///
/// Owns exactly one transport. Dropping the handle releases the transport
/// without touching the job itself; [`JobHandle::terminate`] also stops the
/// job (kills a local child, ends a remote body). The `finished` token is
/// cancelled once the job is over, however it ended.
pub struct JobHandle {
    transport: Transport,
    terminator: CancellationToken,
    finished: CancellationToken,
}

impl JobHandle {
    /// Signals produced in-process. The producer cancels `finished` when the
    /// job has ended.
    pub fn from_signals(
        rx: mpsc::Receiver<ProgressSignal>,
        terminator: CancellationToken,
        finished: CancellationToken,
    ) -> Self {
        Self {
            transport: Transport::Signals(rx),
            terminator,
            finished,
        }
    }

    /// A remote job lives exactly as long as its response body.
    pub fn passthrough(
        body: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        let finished = CancellationToken::new();
        let guard = finished.clone().drop_guard();
        let body = body.map(move |chunk| {
            let _keep = &guard;
            chunk
        });

        Self {
            transport: Transport::Passthrough(body.boxed()),
            terminator: CancellationToken::new(),
            finished,
        }
    }

    /// A handle whose only signal is a terminal failure.
    pub fn failed(message: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this send cannot fail.
        let _ = tx.try_send(ProgressSignal::failed(message));

        let finished = CancellationToken::new();
        finished.cancel();
        Self::from_signals(rx, CancellationToken::new(), finished)
    }

    /// Token that terminates this job when cancelled.
    pub fn terminator(&self) -> CancellationToken {
        self.terminator.clone()
    }

    /// Token cancelled once the job has ended.
    pub fn finished(&self) -> CancellationToken {
        self.finished.clone()
    }

    pub fn terminate(&self) {
        self.terminator.cancel();
    }

    pub fn into_parts(self) -> (Transport, CancellationToken) {
        (self.transport, self.terminator)
    }

    /// Consume the transport to the end, logging what arrives.
    ///
    /// Used when nobody is listening (detached submissions); returns the first
    /// terminal signal seen, if any.
    pub async fn drain(self) -> Option<ProgressSignal> {
        match self.transport {
            Transport::Signals(mut rx) => {
                let mut terminal = None;
                while let Some(signal) = rx.recv().await {
                    tracing::debug!(?signal, "Detached job signal");
                    if terminal.is_none() && signal.is_terminal() {
                        terminal = Some(signal);
                    }
                }
                terminal
            }
            Transport::Passthrough(mut body) => {
                while let Some(chunk) = body.next().await {
                    if let Err(e) = chunk {
                        tracing::warn!(error = %e, "Detached remote job stream failed");
                        break;
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_handle_yields_single_error() {
        let handle = JobHandle::failed("no runnable backend");
        let (transport, _) = handle.into_parts();

        let Transport::Signals(mut rx) = transport else {
            panic!("expected in-process signals");
        };
        assert_eq!(
            rx.recv().await,
            Some(ProgressSignal::failed("no runnable backend"))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_drain_reports_first_terminal() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(ProgressSignal::line("working")).await.unwrap();
        tx.send(ProgressSignal::exited(0)).await.unwrap();
        tx.send(ProgressSignal::failed("late")).await.unwrap();
        drop(tx);

        let handle = JobHandle::from_signals(rx, CancellationToken::new(), CancellationToken::new());
        assert_eq!(handle.drain().await, Some(ProgressSignal::exited(0)));
    }

    #[test]
    fn test_failed_handle_is_already_finished() {
        assert!(JobHandle::failed("x").finished().is_cancelled());
    }

    #[tokio::test]
    async fn test_passthrough_finishes_when_body_is_dropped() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from_static(b"data: hi\n\n"))];
        let handle = JobHandle::passthrough(futures::stream::iter(chunks));
        let finished = handle.finished();
        assert!(!finished.is_cancelled());

        let (transport, _) = handle.into_parts();
        let Transport::Passthrough(mut body) = transport else {
            panic!("expected passthrough body");
        };
        assert!(body.next().await.is_some());
        assert!(!finished.is_cancelled());

        drop(body);
        assert!(finished.is_cancelled());
    }

    #[test]
    fn test_terminate_cancels_token() {
        let handle = JobHandle::failed("x");
        let token = handle.terminator();
        assert!(!token.is_cancelled());

        handle.terminate();
        assert!(token.is_cancelled());
    }
}
