// crates/core/src/status.rs
//! The persisted job status record and its lifecycle stages.

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a job. Progresses monotonically through the working
/// stages; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initializing,
    Analyzing,
    Generating,
    Formatting,
    Finalizing,
    Completed,
    Failed,
}

impl Stage {
    /// Terminal stages admit no further mutation of stage/progress/ETA.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::Analyzing => "analyzing",
            Stage::Generating => "generating",
            Stage::Formatting => "formatting",
            Stage::Finalizing => "finalizing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }
}

/// Artifact attached to a status record once the job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub doc_html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl JobResult {
    /// Mock artifact for a completed generation job. Real content generation
    /// is out of scope; the tracker only manages the job's state.
    pub(crate) fn generated(job_id: &str, prompt: &str) -> Self {
        Self {
            doc_html: format!(
                "<h1>Generated Document</h1>\n<p><strong>Based on prompt:</strong> {prompt}</p>"
            ),
            pdf_url: Some(format!("/api/pdf/{job_id}")),
        }
    }

    /// Mock artifact for a completed refinement job.
    pub(crate) fn refined(full_document: Option<&str>) -> Self {
        let doc_html = match full_document {
            Some(html) => format!("{html}<p>Refined content added.</p>"),
            None => "<p>Refined content</p>".to_string(),
        };
        Self {
            doc_html,
            pdf_url: None,
        }
    }
}

/// The sole persisted entity: one mutable status record per job.
///
/// `job_id` and `start_time` are set at creation and never change. All other
/// fields are mutated exclusively through [`StatusStore::merge`]
/// (crate::store::StatusStore), which enforces terminal immutability and
/// monotone progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    pub stage: Stage,
    /// 0–100, non-decreasing while the job is live; pinned to 100 on completion.
    pub progress: u8,
    pub message: String,
    pub current_step: String,
    pub total_steps: u32,
    pub completed_steps: u32,
    /// Seconds, clamped to >= 0.
    pub estimated_time_remaining: u64,
    /// Append-only log of sub-step lines; never truncated or reordered.
    pub details: Vec<String>,
    /// Epoch milliseconds at creation; retention is measured from here.
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
