//! Canned artifacts and a fake remote job runner.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

/// Content artifact keyed by platform, the way the generator writes it.
pub const FIVE_PLATFORM_POSTS: &str = r##"{
  "X": [{"hook": "Your calendar is a to-do list", "body": "Let an assistant schedule the deep work.", "hashtags": "#AI #productivity"}],
  "LinkedIn": [{"title": "Three AI tools that gave my team a day back", "content": "Meeting notes, triage and drafts."}],
  "Instagram": [{"hook": "Desk setup, 2024 edition", "body": "One screen, one assistant.", "cta": "Share yours"}],
  "YouTube": [{"headline": "I tried 10 AI productivity apps", "description": "Only two survived the week."}],
  "Facebook": [{"hook": "Quick tip", "text": "Ask your assistant for a daily summary at 5pm."}]
}"##;

pub const REPORT_MARKDOWN: &str = "# AI productivity tools\n\n- 5 platforms\n- 5 posts\n";

/// Event stream of a successful remote run.
pub const COMPLETED_STREAM: &str = "data: researching topic\n\n\
data: drafting posts\n\n\
data: writing artifacts\n\n\
data: {\"status\":\"completed\"}\n\n";

/// A remote runner serving a fixed `/run` stream and a set of `/file` artifacts.
#[derive(Clone, Default)]
pub struct FakeRunner {
    pub stream: String,
    pub files: HashMap<String, String>,
}

impl FakeRunner {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, name: &str, body: &str) -> Self {
        self.files.insert(name.to_string(), body.to_string());
        self
    }

    /// Both artifacts of a complete five-platform run.
    pub fn with_default_artifacts(self) -> Self {
        self.with_file("social_posts.json", FIVE_PLATFORM_POSTS)
            .with_file("report.md", REPORT_MARKDOWN)
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/run", get(fake_run))
            .route("/file/:name", get(fake_file))
            .layer(Extension(Arc::new(self)))
    }
}

async fn fake_run(Extension(runner): Extension<Arc<FakeRunner>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        runner.stream.clone(),
    )
        .into_response()
}

async fn fake_file(
    Extension(runner): Extension<Arc<FakeRunner>>,
    Path(name): Path<String>,
) -> Response {
    match runner.files.get(&name) {
        Some(body) => body.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
