//! API route handlers for the docflow server.

pub mod cancel;
pub mod generate;
pub mod health;
pub mod status;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health                  - Health check (includes store mode)
/// - POST /api/generate                - Start a document generation job
/// - POST /api/refine                  - Start a refinement job
/// - GET  /api/status/{job_id}         - Current job status snapshot
/// - GET  /api/status/{job_id}/stream  - SSE stream of status snapshots
/// - POST /api/cancel/{job_id}         - Cancel a running job
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", generate::router())
        .nest("/api", status::router())
        .nest("/api", cancel::router())
        .with_state(state)
}
