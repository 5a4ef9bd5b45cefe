// crates/server/src/routes/generate.rs
//! Job creation routes.
//!
//! - POST /generate — Start a document generation job
//! - POST /refine   — Start a refinement job (optionally reusing a job id)

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use docflow_core::RefinementRequest;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

/// Acknowledgement returned by both creation endpoints. Clients follow
/// `status_url` (or the SSE stream) for progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct JobAccepted {
    pub job_id: String,
    pub message: String,
    pub status_url: String,
}

impl JobAccepted {
    fn new(job_id: String, message: &str) -> Self {
        let status_url = format!("/api/status/{}", job_id);
        Self {
            job_id,
            message: message.to_string(),
            status_url,
        }
    }
}

/// POST /api/generate — Start a generation job.
async fn start_generation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateRequest>,
) -> ApiResult<Json<JobAccepted>> {
    let status = state.registry.create_generation(&body.prompt).await?;
    Ok(Json(JobAccepted::new(status.job_id, "Generation started")))
}

/// POST /api/refine — Start a refinement job.
async fn start_refinement(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefinementRequest>,
) -> ApiResult<Json<JobAccepted>> {
    let status = state.registry.create_refinement(body).await?;
    Ok(Json(JobAccepted::new(status.job_id, "Refinement started")))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(start_generation))
        .route("/refine", post(start_refinement))
}
