//! CLI for running a content generation job against a Postcast server
//!
//! Streams the job's progress to stdout, then prints the normalized posts and
//! the report (or the raw content when it could not be normalized).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use postcast_core::client::{RunClient, RunOutcome, StreamSignal};
use postcast_core::domains::posts::PostEntry;
use postcast_core::kernel::artifacts::{ArtifactNames, LocalArtifactSource};
use postcast_core::kernel::jobs::JobRequest;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "postcast")]
#[command(about = "Generate social content for a topic and show the result")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one job and wait for its result
    Run {
        /// Topic to generate content for (the job's default when omitted)
        #[arg(long)]
        topic: Option<String>,

        /// Server base address
        #[arg(long, default_value = "http://localhost:8080")]
        server: String,

        /// Client id; a new run with the same id replaces the previous one
        #[arg(long)]
        client: Option<String>,

        /// Read artifacts from this directory instead of the server
        #[arg(long)]
        local_artifacts: Option<PathBuf>,

        /// Content artifact name
        #[arg(long)]
        content: Option<String>,

        /// Report artifact name
        #[arg(long)]
        report: Option<String>,

        /// Print the canonical posts document as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            topic,
            server,
            client,
            local_artifacts,
            content,
            report,
            json,
        } => {
            let defaults = ArtifactNames::default();
            let names = ArtifactNames {
                content: content.unwrap_or(defaults.content),
                report: report.unwrap_or(defaults.report),
            };

            let mut run_client = RunClient::new(server).with_artifact_names(names);
            if let Some(client) = client {
                run_client = run_client.with_client_id(client);
            }
            if let Some(dir) = local_artifacts {
                run_client = run_client.with_artifact_source(Arc::new(LocalArtifactSource::new(dir)));
            }

            let outcome = run_client
                .run(&JobRequest::new(topic), print_signal)
                .await;

            if let Some(error) = outcome.user_error() {
                bail!("{}", error);
            }

            if json {
                print_json(&outcome)?;
            } else {
                print_summary(&outcome);
            }
        }
    }

    Ok(())
}

fn print_signal(signal: &StreamSignal) {
    match signal {
        StreamSignal::Line(text) => println!("{}", text),
        StreamSignal::Status { status, message } => match message {
            Some(message) => println!("[{}] {}", status, message),
            None => println!("[{}]", status),
        },
        StreamSignal::Done { code } => match code {
            Some(code) => println!("[done] exit code {}", code),
            None => println!("[done]"),
        },
        StreamSignal::Error(message) => eprintln!("[error] {}", message),
    }
}

fn print_json(outcome: &RunOutcome) -> Result<()> {
    let document = outcome
        .document
        .as_ref()
        .context("content could not be normalized")?;
    println!(
        "{}",
        serde_json::to_string_pretty(document).context("Failed to serialize posts")?
    );
    Ok(())
}

fn print_summary(outcome: &RunOutcome) {
    for line in &outcome.artifacts.diagnostics {
        eprintln!("warning: {}", line);
    }

    println!();
    match (&outcome.document, &outcome.artifacts.content) {
        (Some(document), _) => {
            for (platform, posts) in document.iter() {
                println!("== {} ({} posts)", platform, posts.len());
                for (i, entry) in posts.iter().enumerate() {
                    match entry {
                        PostEntry::Post(post) => {
                            println!("{}. {}", i + 1, post.hook.as_deref().unwrap_or("(no hook)"));
                            if let Some(body) = &post.body {
                                println!("   {}", body);
                            }
                            if let Some(cta) = &post.cta {
                                println!("   -> {}", cta);
                            }
                            if !post.hashtags.is_empty() {
                                println!("   {}", post.hashtags.join(" "));
                            }
                        }
                        PostEntry::Raw(value) => println!("{}. {}", i + 1, value),
                    }
                }
            }
        }
        (None, Some(raw)) => {
            println!("Content could not be normalized; raw output follows.");
            println!("{}", raw);
        }
        (None, None) => println!("No content artifact available."),
    }

    if let Some(report) = &outcome.artifacts.report {
        println!();
        println!("{}", report);
    }
}
