//! Local subprocess jobs, driven through small shell scripts.

mod common;

use std::path::Path;
use std::time::Duration;

use common::collect_signals;
use postcast_core::kernel::env_resolver;
use postcast_core::kernel::jobs::{
    BaseJobLauncher, JobRequest, JobStatus, LocalJobLauncher, ProgressSignal,
};

const JOB_TIMEOUT: Duration = Duration::from_secs(10);

fn shell_launcher(workdir: &Path, script: &str) -> LocalJobLauncher {
    std::fs::write(workdir.join("job.sh"), script).unwrap();

    LocalJobLauncher::new(workdir, workdir.join("output"))
        .with_cli_path(workdir.join("missing-agent"))
        .with_python_bin(Some("sh".to_string()))
        .with_script("job.sh")
        .with_interpreters(Vec::<String>::new())
}

fn lines(signals: &[ProgressSignal]) -> Vec<&str> {
    signals
        .iter()
        .filter_map(|signal| match signal {
            ProgressSignal::RawLine(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_job_output_exit_code_and_diagnostics() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let launcher = shell_launcher(
        dir.path(),
        r#"echo "args: $1 $2"
echo "env topic: $TOPIC"
echo "rate limited, retrying" >&2
mkdir -p output
printf '{"twitter": []}' > output/social_posts.json
exit 3
"#,
    );

    let env = env_resolver::resolve_from_process(None);
    let handle = launcher
        .launch(&JobRequest::new(Some("rust".into())), &env)
        .await
        .unwrap();
    let finished = handle.finished();
    let signals = collect_signals(handle, JOB_TIMEOUT).await;
    assert!(finished.is_cancelled());

    assert_eq!(
        signals.first(),
        Some(&ProgressSignal::status(
            JobStatus::Running,
            Some("Generating content for rust".into())
        ))
    );

    let output = lines(&signals);
    assert!(output.contains(&"args: --topic rust"));
    assert!(output.contains(&"env topic: rust"));
    assert!(output.contains(&"rate limited, retrying"));

    let exit_at = signals
        .iter()
        .position(|s| *s == ProgressSignal::exited(3))
        .expect("exit marker");
    assert_eq!(
        lines(&signals[exit_at..]),
        vec![
            "content artifact social_posts.json: present",
            "report artifact report.md: missing",
        ]
    );
    assert_eq!(signals.iter().filter(|s| s.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_default_topic_passes_no_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = shell_launcher(dir.path(), "echo \"argc: $#\"\necho \"topic: ${TOPIC:-unset}\"\n");

    let env = env_resolver::resolve_from_process(None);
    let handle = launcher
        .launch(&JobRequest::new(Some("   ".into())), &env)
        .await
        .unwrap();
    let signals = collect_signals(handle, JOB_TIMEOUT).await;

    let output = lines(&signals);
    assert!(output.contains(&"argc: 0"));
    assert!(output.contains(&"topic: unset"));
    assert!(signals.contains(&ProgressSignal::exited(0)));
}

#[tokio::test]
async fn test_env_file_overrides_reach_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join(".env.job");
    std::fs::write(&env_file, "POSTCAST_TEST_GREETING=hello from env file\n").unwrap();
    let launcher = shell_launcher(dir.path(), "echo \"$POSTCAST_TEST_GREETING\"\n");

    let env = env_resolver::resolve_from_process(Some(&env_file));
    let handle = launcher.launch(&JobRequest::default(), &env).await.unwrap();
    let signals = collect_signals(handle, JOB_TIMEOUT).await;

    assert!(lines(&signals).contains(&"hello from env file"));
}

#[tokio::test]
async fn test_terminate_kills_running_job() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = shell_launcher(dir.path(), "echo started\nexec sleep 30\n");

    let env = env_resolver::resolve_from_process(None);
    let handle = launcher.launch(&JobRequest::default(), &env).await.unwrap();
    handle.terminate();
    let signals = collect_signals(handle, JOB_TIMEOUT).await;

    assert!(signals.contains(&ProgressSignal::exited(-1)));
}

#[tokio::test]
async fn test_dropped_handle_lets_job_finish() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = shell_launcher(
        dir.path(),
        "i=0\nwhile [ $i -lt 2000 ]; do echo \"line $i\"; i=$((i+1)); done\nmkdir -p output\necho '# done' > output/report.md\n",
    );

    let env = env_resolver::resolve_from_process(None);
    let handle = launcher.launch(&JobRequest::default(), &env).await.unwrap();
    drop(handle);

    let report = dir.path().join("output").join("report.md");
    tokio::time::timeout(JOB_TIMEOUT, async {
        while !report.is_file() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("job should keep running without a listener");
}
