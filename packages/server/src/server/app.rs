//! Application setup and server configuration.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::artifacts::{ArtifactSource, HttpArtifactSource, LocalArtifactSource};
use crate::kernel::jobs::{create_job_launcher, BaseJobLauncher};
use crate::kernel::run_registry::RunRegistry;
use crate::server::routes::{file_handler, health_handler, run_stream_handler, submit_run_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub launcher: Arc<dyn BaseJobLauncher>,
    /// Where `/file/{name}` reads artifacts from.
    pub artifacts: Arc<dyn ArtifactSource>,
    pub runs: RunRegistry,
    /// External env overrides for local jobs, re-read on every run.
    pub env_file: Option<PathBuf>,
}

impl AppState {
    pub fn new(launcher: Arc<dyn BaseJobLauncher>, artifacts: Arc<dyn ArtifactSource>) -> Self {
        Self {
            launcher,
            artifacts,
            runs: RunRegistry::new(),
            env_file: None,
        }
    }

    pub fn with_env_file(mut self, env_file: impl Into<PathBuf>) -> Self {
        self.env_file = Some(env_file.into());
        self
    }

    /// Launch strategy and artifact origin both follow the configured mode.
    pub fn from_config(config: &Config) -> Self {
        let artifacts: Arc<dyn ArtifactSource> = match &config.job_runner_url {
            Some(base_url) => Arc::new(HttpArtifactSource::new(base_url.clone())),
            None => Arc::new(LocalArtifactSource::new(&config.output_dir)),
        };

        Self::new(create_job_launcher(config), artifacts).with_env_file(&config.job_env_file)
    }
}

/// Build the router over an existing state (no CORS).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/run", get(run_stream_handler).post(submit_run_handler))
        .route("/file/:name", get(file_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Build the Axum application router
pub fn build_app(config: &Config) -> Router {
    build_router(AppState::from_config(config)).layer(cors_layer(&config.allowed_origins))
}

/// CORS: any origin unless an explicit list is configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}
