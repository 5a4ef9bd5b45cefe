// crates/server/src/routes/cancel.rs
//! Job cancellation route.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use docflow_core::CancelOutcome;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct CancelResponse {
    pub job_id: String,
    pub message: String,
}

/// POST /api/cancel/{job_id} — Cancel a running job.
///
/// Cancelling a job that already finished is not an error; the response says
/// so and the record is left untouched.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let outcome = state.registry.cancel(&job_id).await?;
    let message = match outcome {
        CancelOutcome::Cancelled => "Job cancelled successfully",
        CancelOutcome::AlreadyTerminal(_) => "Job already completed",
    };
    Ok(Json(CancelResponse {
        job_id,
        message: message.to_string(),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/cancel/{job_id}", post(cancel_job))
}
