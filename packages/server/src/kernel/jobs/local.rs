//! Local subprocess launcher.
//!
//! Tries, in order: the dedicated CLI binary (when present on disk), the
//! interpreter named by `PYTHON_BIN`, then the fallback interpreter names.
//! The first candidate that spawns wins. Standard output and standard error
//! are split into lines and surfaced as identical raw lines.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handle::{JobHandle, SIGNAL_CAPACITY};
use super::launcher::{BaseJobLauncher, LaunchError, LaunchMode};
use super::signal::{JobRequest, JobStatus, ProgressSignal};
use crate::config::{Config, FALLBACK_INTERPRETERS};
use crate::kernel::artifacts::{artifact_diagnostics, ArtifactNames};
use crate::kernel::env_resolver::JobEnv;

/// One way of starting the generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub program: PathBuf,
    /// Arguments placed before the topic flag.
    pub args: Vec<String>,
}

impl Candidate {
    fn command(&self, topic: Option<&str>, workdir: &Path, env: &JobEnv) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(topic) = topic {
            cmd.arg("--topic").arg(topic);
        }
        cmd.current_dir(workdir)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(topic) = topic {
            cmd.env("TOPIC", topic);
        }
        cmd
    }
}

pub struct LocalJobLauncher {
    workdir: PathBuf,
    cli_path: PathBuf,
    script: String,
    python_bin: Option<String>,
    interpreters: Vec<String>,
    output_dir: PathBuf,
    artifacts: ArtifactNames,
}

impl LocalJobLauncher {
    pub fn new(workdir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            cli_path: workdir.join("bin").join("postcast-agent"),
            script: "main.py".to_string(),
            python_bin: None,
            interpreters: FALLBACK_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
            output_dir: output_dir.into(),
            artifacts: ArtifactNames::default(),
            workdir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.job_workdir, &config.output_dir)
            .with_cli_path(&config.job_cli_path)
            .with_script(&config.job_script)
            .with_python_bin(config.python_bin.clone())
            .with_artifacts(config.artifacts.clone())
    }

    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_python_bin(mut self, python_bin: Option<String>) -> Self {
        self.python_bin = python_bin;
        self
    }

    /// Replace the fallback interpreter names.
    pub fn with_interpreters<I, S>(mut self, interpreters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpreters = interpreters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactNames) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Candidates in priority order. The CLI binary is only listed when it exists.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        if self.cli_path.is_file() {
            candidates.push(Candidate {
                program: self.cli_path.clone(),
                args: Vec::new(),
            });
        }

        let interpreters = self.python_bin.iter().chain(self.interpreters.iter());
        for interpreter in interpreters {
            candidates.push(Candidate {
                program: PathBuf::from(interpreter),
                args: vec![self.script.clone()],
            });
        }

        candidates
    }

    fn spawn_first(&self, topic: Option<&str>, env: &JobEnv) -> Result<(Child, Candidate), LaunchError> {
        let mut attempted = Vec::new();

        for candidate in self.candidates() {
            match candidate.command(topic, &self.workdir, env).spawn() {
                Ok(child) => return Ok((child, candidate)),
                Err(e) => {
                    tracing::warn!(
                        program = %candidate.program.display(),
                        error = %e,
                        "Job candidate failed to start"
                    );
                    attempted.push(candidate.program.display().to_string());
                }
            }
        }

        Err(LaunchError::NoRunnableBackend { attempted })
    }
}

#[async_trait]
impl BaseJobLauncher for LocalJobLauncher {
    fn mode(&self) -> LaunchMode {
        LaunchMode::Local
    }

    async fn launch(&self, request: &JobRequest, env: &JobEnv) -> Result<JobHandle, LaunchError> {
        let topic = request.topic();
        let (mut child, candidate) = self.spawn_first(topic, env)?;

        tracing::info!(
            program = %candidate.program.display(),
            pid = ?child.id(),
            topic = topic.unwrap_or("<default>"),
            "Job process started"
        );

        let (tx, rx) = mpsc::channel(SIGNAL_CAPACITY);
        let terminator = CancellationToken::new();
        let finished = CancellationToken::new();

        let _ = tx
            .send(ProgressSignal::status(
                JobStatus::Running,
                Some(format!(
                    "Generating content for {}",
                    topic.unwrap_or("the default topic")
                )),
            ))
            .await;

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_lines(stderr, tx.clone())));
        }

        tokio::spawn(supervise(
            child,
            pumps,
            tx,
            terminator.clone(),
            finished.clone(),
            self.output_dir.clone(),
            self.artifacts.clone(),
        ));

        Ok(JobHandle::from_signals(rx, terminator, finished))
    }
}

/// Forward each line of `reader` as a raw line.
///
/// Keeps reading after the receiver is gone so the child never blocks on a
/// full pipe; it may still be writing its artifacts.
async fn pump_lines<R>(reader: R, tx: mpsc::Sender<ProgressSignal>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(&['\r', '\n'][..]);
                let _ = tx.send(ProgressSignal::line(line)).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Job output read failed");
                break;
            }
        }
    }
}

/// Wait for the child, then emit its exit marker and artifact diagnostics.
async fn supervise(
    mut child: Child,
    pumps: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<ProgressSignal>,
    terminator: CancellationToken,
    finished: CancellationToken,
    output_dir: PathBuf,
    artifacts: ArtifactNames,
) {
    let _finished = finished.drop_guard();

    let status = tokio::select! {
        status = child.wait() => status,
        _ = terminator.cancelled() => {
            tracing::info!(pid = ?child.id(), "Terminating job process");
            let _ = child.start_kill();
            child.wait().await
        }
    };

    // Remaining output precedes the exit marker.
    for pump in pumps {
        let _ = pump.await;
    }

    let code = match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to wait on job process");
            -1
        }
    };
    tracing::info!(code, "Job process exited");

    let _ = tx.send(ProgressSignal::exited(code)).await;
    for line in artifact_diagnostics(&output_dir, &artifacts) {
        let _ = tx.send(ProgressSignal::line(line)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("postcast-agent");
        std::fs::write(&cli, "").unwrap();

        let launcher = LocalJobLauncher::new(dir.path(), dir.path().join("output"))
            .with_cli_path(&cli)
            .with_python_bin(Some("/opt/python/bin/python".into()));

        let programs: Vec<PathBuf> = launcher
            .candidates()
            .into_iter()
            .map(|c| c.program)
            .collect();

        assert_eq!(
            programs,
            vec![
                cli,
                PathBuf::from("/opt/python/bin/python"),
                PathBuf::from("python3"),
                PathBuf::from("python"),
            ]
        );
    }

    #[test]
    fn test_missing_cli_binary_is_not_a_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = LocalJobLauncher::new(dir.path(), dir.path().join("output"))
            .with_script("generate.py");

        let candidates = launcher.candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].program, PathBuf::from("python3"));
        assert_eq!(candidates[0].args, vec!["generate.py".to_string()]);
    }

    #[tokio::test]
    async fn test_exhausted_candidates_fail_launch() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = LocalJobLauncher::new(dir.path(), dir.path().join("output"))
            .with_python_bin(Some("postcast-missing-interpreter".into()))
            .with_interpreters(Vec::<String>::new());

        let result = launcher.launch(&JobRequest::default(), &JobEnv::new()).await;

        match result {
            Err(LaunchError::NoRunnableBackend { attempted }) => {
                assert_eq!(attempted, vec!["postcast-missing-interpreter".to_string()]);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("launch should fail"),
        }
    }
}
