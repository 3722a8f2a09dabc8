//! Artifact retrieval.
//!
//! GET /file/:name
//!
//! Names must match `^[A-Za-z0-9._-]+\.(md|json|txt)$`; anything else is
//! rejected before a fetch is attempted. Local mode reads the job output
//! directory, remote mode proxies the runner's own `/file` endpoint.

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::kernel::artifacts::{validate_artifact_name, ArtifactError};
use crate::server::app::AppState;

pub async fn file_handler(
    Extension(state): Extension<AppState>,
    Path(name): Path<String>,
) -> Response {
    if let Err(e) = validate_artifact_name(&name) {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    match state.artifacts.fetch(&name).await {
        Ok(artifact) => {
            let content_type = artifact.content_type.unwrap_or_else(|| {
                mime_guess::from_path(&name)
                    .first_or_octet_stream()
                    .to_string()
            });
            ([(header::CONTENT_TYPE, content_type)], artifact.body).into_response()
        }
        Err(ArtifactError::NotFound(_)) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
        Err(ArtifactError::InvalidName(name)) => {
            (StatusCode::BAD_REQUEST, format!("invalid artifact name: {}", name)).into_response()
        }
        Err(e) => {
            tracing::warn!(artifact = %name, error = %e, "Artifact fetch failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
