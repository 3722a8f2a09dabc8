//! In-process servers and launchers for integration testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use postcast_core::kernel::env_resolver::JobEnv;
use postcast_core::kernel::jobs::{
    BaseJobLauncher, JobHandle, JobRequest, LaunchError, LaunchMode, ProgressSignal, Transport,
    SIGNAL_CAPACITY,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Initialize tracing once, respecting RUST_LOG.
/// Run tests with: RUST_LOG=debug cargo test -- --nocapture
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serve `app` on an ephemeral local port and return its base address.
pub async fn spawn_server(app: Router) -> String {
    init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    format!("http://{}", addr)
}

/// Launcher that replays a fixed list of signals and records what it was asked.
///
/// Its jobs stay live until terminated unless built with [`ScriptedLauncher::finishing`].
#[derive(Default)]
pub struct ScriptedLauncher {
    signals: Vec<ProgressSignal>,
    fail_with: Option<String>,
    finishes: bool,
    pub topics: Mutex<Vec<Option<String>>>,
    pub terminators: Mutex<Vec<CancellationToken>>,
}

impl ScriptedLauncher {
    pub fn new(signals: Vec<ProgressSignal>) -> Arc<Self> {
        Arc::new(Self {
            signals,
            ..Default::default()
        })
    }

    /// Jobs end as soon as their signals are emitted.
    pub fn finishing(signals: Vec<ProgressSignal>) -> Arc<Self> {
        Arc::new(Self {
            signals,
            finishes: true,
            ..Default::default()
        })
    }

    /// A launcher whose every launch fails with no runnable backend.
    pub fn failing(attempted: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(attempted.to_string()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl BaseJobLauncher for ScriptedLauncher {
    fn mode(&self) -> LaunchMode {
        LaunchMode::Local
    }

    async fn launch(&self, request: &JobRequest, _env: &JobEnv) -> Result<JobHandle, LaunchError> {
        self.topics
            .lock()
            .unwrap()
            .push(request.topic().map(str::to_string));

        if let Some(attempted) = &self.fail_with {
            return Err(LaunchError::NoRunnableBackend {
                attempted: vec![attempted.clone()],
            });
        }

        let (tx, rx) = mpsc::channel(SIGNAL_CAPACITY);
        for signal in &self.signals {
            tx.send(signal.clone()).await.expect("scripted signal");
        }

        let terminator = CancellationToken::new();
        self.terminators.lock().unwrap().push(terminator.clone());

        let finished = CancellationToken::new();
        if self.finishes {
            finished.cancel();
        }
        Ok(JobHandle::from_signals(rx, terminator, finished))
    }
}

/// Collect every in-process signal of a handle, failing the test after `timeout`.
pub async fn collect_signals(handle: JobHandle, timeout: Duration) -> Vec<ProgressSignal> {
    let (transport, _) = handle.into_parts();
    let Transport::Signals(mut rx) = transport else {
        panic!("expected in-process signals");
    };

    let mut signals = Vec::new();
    tokio::time::timeout(timeout, async {
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
    })
    .await
    .expect("job did not finish in time");
    signals
}
