// crates/core/src/registry.rs
//! Job registry: id allocation, initial records, and the cancellation gate.
//!
//! `create_*` writes the initial record synchronously before returning, so a
//! status lookup immediately after creation never sees "not found", then
//! spawns the stage runner as an independent background task.

use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use tokio_stream::Stream;

use crate::config::TrackerConfig;
use crate::error::JobError;
use crate::plan::StagePlan;
use crate::runner;
use crate::status::{epoch_millis, JobResult, JobStatus, Stage};
use crate::store::{StatusPatch, StatusStore};
use crate::watch::{watch_job, WatchEvent};

const ID_SUFFIX_LEN: usize = 9;
const ID_SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Input for a refinement job. Supplying `job_id` re-arms that record (the
/// sanctioned overwrite) instead of allocating a new id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementRequest {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub selection_content: Option<String>,
    #[serde(default)]
    pub full_document_content: Option<String>,
}

/// Outcome of the cancellation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The job was already terminal; cancellation is an idempotent no-op.
    AlreadyTerminal(Stage),
}

/// Owns the id-to-record mapping (delegating storage to the status store)
/// and launches one stage-runner task per created job.
pub struct JobRegistry {
    store: Arc<StatusStore>,
    config: TrackerConfig,
}

impl JobRegistry {
    pub fn new(store: Arc<StatusStore>, config: TrackerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start a generation job. Rejects an empty prompt without writing
    /// anything.
    pub async fn create_generation(&self, prompt: &str) -> Result<JobStatus, JobError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(JobError::InvalidPrompt);
        }

        let job_id = new_job_id();
        if self.store.get(&job_id).await.is_some() {
            return Err(JobError::IdCollision(job_id));
        }

        let status = initial_generation_status(&job_id);
        self.store.put(&job_id, status.clone()).await;
        tracing::info!(job_id = %job_id, "generation job created");

        self.spawn_runner(
            job_id.clone(),
            StagePlan::generation(),
            JobResult::generated(&job_id, prompt),
        );
        Ok(status)
    }

    /// Start a refinement job, reusing the caller's job id when supplied.
    pub async fn create_refinement(
        &self,
        request: RefinementRequest,
    ) -> Result<JobStatus, JobError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(JobError::InvalidPrompt);
        }

        let job_id = match request.job_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                let id = new_job_id();
                if self.store.get(&id).await.is_some() {
                    return Err(JobError::IdCollision(id));
                }
                id
            }
        };

        // Full replace: re-arms a terminal (or unknown) record under the same
        // id. This is the one sanctioned overwrite in the system.
        let status = initial_refinement_status(&job_id);
        self.store.put(&job_id, status.clone()).await;
        tracing::info!(job_id = %job_id, "refinement job created");

        self.spawn_runner(
            job_id,
            StagePlan::refinement(),
            JobResult::refined(request.full_document_content.as_deref()),
        );
        Ok(status)
    }

    /// Current status of a job.
    pub async fn status(&self, job_id: &str) -> Result<JobStatus, JobError> {
        self.store
            .get(job_id)
            .await
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Cancellation gate. A non-terminal record gets the single cancellation
    /// merge; a terminal record is reported as-is. The stage runner observes
    /// the terminal stage on its next tick and stops.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelOutcome, JobError> {
        let current = self
            .store
            .get(job_id)
            .await
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if current.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal(current.stage));
        }

        self.store.merge(job_id, StatusPatch::cancelled()).await;
        tracing::info!(job_id, "job cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Live snapshot stream for one observer; see [`crate::watch`].
    pub fn watch(&self, job_id: &str) -> impl Stream<Item = WatchEvent> + Send + 'static {
        watch_job(
            Arc::clone(&self.store),
            job_id.to_string(),
            self.config.poll_interval(),
        )
    }

    fn spawn_runner(&self, job_id: String, plan: &'static StagePlan, result: JobResult) {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        tokio::spawn(runner::run_supervised(store, config, job_id, plan, result));
    }
}

/// `job_{epoch_ms}_{random suffix}` — unique within this process's address
/// space; the registry still checks for collisions before writing.
fn new_job_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_CHARS[rng.gen_range(0..ID_SUFFIX_CHARS.len())] as char)
        .collect();
    format!("job_{}_{}", epoch_millis(), suffix)
}

fn initial_generation_status(job_id: &str) -> JobStatus {
    JobStatus {
        job_id: job_id.to_string(),
        stage: Stage::Initializing,
        progress: 0,
        message: "Starting document generation...".to_string(),
        current_step: "Initializing".to_string(),
        total_steps: StagePlan::generation().total_steps,
        completed_steps: 0,
        estimated_time_remaining: StagePlan::generation().nominal_total_secs(),
        details: vec!["Job created".to_string(), "Validating prompt".to_string()],
        start_time: epoch_millis(),
        result: None,
    }
}

fn initial_refinement_status(job_id: &str) -> JobStatus {
    JobStatus {
        job_id: job_id.to_string(),
        stage: Stage::Analyzing,
        progress: 5,
        message: "Analyzing content for refinement...".to_string(),
        current_step: "Analyzing".to_string(),
        total_steps: StagePlan::refinement().total_steps,
        completed_steps: 0,
        estimated_time_remaining: StagePlan::refinement().nominal_total_secs(),
        details: vec![
            "Refinement started".to_string(),
            "Analyzing existing content".to_string(),
        ],
        start_time: epoch_millis(),
        result: None,
    }
}
