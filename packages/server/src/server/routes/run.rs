//! Job run endpoints.
//!
//! GET /run?topic=<string?>&client=<id?>
//!
//! Starts a job and streams its progress as server-sent events for as long as
//! the job runs. A new run from the same client (the `client` parameter, else
//! the peer address) terminates that client's previous run first.
//!
//! POST /run  {"topic"?: string}
//!
//! Starts a job without streaming and acknowledges it.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::kernel::env_resolver;
use crate::kernel::event_stream;
use crate::kernel::jobs::{JobHandle, JobRequest};
use crate::server::app::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    topic: Option<String>,
    /// Client context a run belongs to
    client: Option<String>,
}

/// SSE stream handler.
pub async fn run_stream_handler(
    Extension(state): Extension<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<RunQuery>,
) -> Response {
    let client = query
        .client
        .filter(|client| !client.trim().is_empty())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string());
    let request = JobRequest::new(query.topic);

    state.runs.terminate(&client).await;

    let env = env_resolver::resolve_from_process(state.env_file.as_deref());
    let handle = match state.launcher.launch(&request, &env).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(client = %client, error = %e, "Job launch failed");
            JobHandle::failed(e.to_string())
        }
    };

    let run_id = state.runs.register(&client, handle.terminator()).await;
    let finished = handle.finished();
    let runs = state.runs.clone();
    tokio::spawn(async move {
        finished.cancelled().await;
        runs.release(&client, run_id).await;
    });

    event_stream::into_response(handle)
}

/// Detached submission handler.
pub async fn submit_run_handler(
    Extension(state): Extension<AppState>,
    body: Option<Json<JobRequest>>,
) -> Response {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let env = env_resolver::resolve_from_process(state.env_file.as_deref());

    match state.launcher.submit(&request, &env).await {
        Ok(ack) => (StatusCode::ACCEPTED, Json(ack)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Job submission failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "status": "failed", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}
