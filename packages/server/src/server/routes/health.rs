use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::kernel::jobs::LaunchMode;
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    mode: LaunchMode,
}

/// Health check endpoint
///
/// Reports liveness and which launch mode this server runs jobs in.
pub async fn health_handler(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        mode: state.launcher.mode(),
    })
}
