use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use crate::kernel::artifacts::ArtifactNames;

/// Interpreter names tried after the CLI binary and the `PYTHON_BIN` override.
pub const FALLBACK_INTERPRETERS: [&str; 2] = ["python3", "python"];

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Remote job runner base address. Selects remote mode when set.
    pub job_runner_url: Option<String>,
    /// External key=value overrides merged over the process environment per run.
    pub job_env_file: PathBuf,
    pub job_workdir: PathBuf,
    pub job_cli_path: PathBuf,
    pub job_script: String,
    pub python_bin: Option<String>,
    pub output_dir: PathBuf,
    pub artifacts: ArtifactNames,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let job_workdir = PathBuf::from(env::var("JOB_WORKDIR").unwrap_or_else(|_| ".".into()));

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            job_runner_url: non_empty_var("JOB_RUNNER_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            job_env_file: non_empty_var("JOB_ENV_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| job_workdir.join(".env.job")),
            job_cli_path: non_empty_var("JOB_CLI_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| job_workdir.join("bin").join("postcast-agent")),
            job_script: non_empty_var("JOB_SCRIPT").unwrap_or_else(|| "main.py".to_string()),
            python_bin: non_empty_var("PYTHON_BIN"),
            output_dir: non_empty_var("JOB_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| job_workdir.join("output")),
            artifacts: ArtifactNames {
                content: non_empty_var("CONTENT_ARTIFACT")
                    .unwrap_or_else(|| ArtifactNames::default().content),
                report: non_empty_var("REPORT_ARTIFACT")
                    .unwrap_or_else(|| ArtifactNames::default().report),
            },
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            job_workdir,
        })
    }

    pub fn is_remote(&self) -> bool {
        self.job_runner_url.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
