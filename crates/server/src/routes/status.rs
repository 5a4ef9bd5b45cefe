// crates/server/src/routes/status.rs
//! Job status routes.
//!
//! - GET /status/{job_id}        — Current status snapshot
//! - GET /status/{job_id}/stream — SSE stream of status snapshots

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::{Json, Router};

use docflow_core::{JobStatus, WatchEvent};

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/status/{job_id} — Current status snapshot.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    let status = state.registry.status(&job_id).await?;
    Ok(Json(status))
}

/// GET /api/status/{job_id}/stream — SSE stream of status snapshots.
///
/// Emits one `status` event per poll until the job reaches a terminal stage,
/// then closes. An unknown job id produces a single `error` event.
async fn stream_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let watch = state.registry.watch(&job_id);

    let stream = async_stream::stream! {
        tokio::pin!(watch);
        while let Some(event) = tokio_stream::StreamExt::next(&mut watch).await {
            match event {
                WatchEvent::Status(status) => {
                    let json = match serde_json::to_string(&status) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize SSE status data");
                            continue;
                        }
                    };
                    yield Ok(Event::default().event("status").data(json));
                }
                WatchEvent::NotFound => {
                    yield Ok(Event::default()
                        .event("error")
                        .data("{\"error\":\"Job not found\"}"));
                }
            }
        }
    };

    Sse::new(stream)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status/{job_id}", get(get_status))
        .route("/status/{job_id}/stream", get(stream_status))
}
