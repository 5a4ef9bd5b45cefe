// crates/core/src/runner.rs
//! Stage runner: drives one job through its plan in a background task.
//!
//! The runner never holds a record across an await. Every write is a fresh
//! read-modify-write through the store, preceded by a terminal check, which
//! is what lets a concurrent cancellation win within one tick.

use std::sync::Arc;
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::plan::StagePlan;
use crate::status::{JobResult, Stage};
use crate::store::{StatusPatch, StatusStore};

/// Run a job's plan to completion, converting an aborted runner task (panic
/// or cancellation) into a terminal `failed` write so the record never hangs
/// in a live stage forever.
pub async fn run_supervised(
    store: Arc<StatusStore>,
    config: TrackerConfig,
    job_id: String,
    plan: &'static StagePlan,
    result: JobResult,
) {
    let task = tokio::spawn(drive(Arc::clone(&store), config, job_id.clone(), plan, result));
    if let Err(err) = task.await {
        tracing::error!(job_id = %job_id, error = %err, "stage runner aborted, marking job failed");
        store
            .merge(
                &job_id,
                StatusPatch {
                    stage: Some(Stage::Failed),
                    message: Some("Internal error while processing job".to_string()),
                    estimated_time_remaining: Some(0),
                    ..StatusPatch::default()
                },
            )
            .await;
    }
}

/// Execute the plan. Stops silently when the record disappears (job
/// withdrawn) or turns terminal (cancelled).
async fn drive(
    store: Arc<StatusStore>,
    config: TrackerConfig,
    job_id: String,
    plan: &'static StagePlan,
    result: JobResult,
) {
    let started = tokio::time::Instant::now();
    let total = plan.scaled_total(&config);
    let tick = config.scaled_tick();

    // The creation step counts as completed once the first stage begins.
    let mut completed_steps: u32 = 1;

    for (index, spec) in plan.stages.iter().enumerate() {
        match store.get(&job_id).await {
            None => {
                tracing::debug!(job_id = %job_id, "status record gone, stopping runner");
                return;
            }
            Some(current) if current.is_terminal() => {
                tracing::debug!(job_id = %job_id, "job already terminal, stopping runner");
                return;
            }
            Some(_) => {}
        }

        store
            .merge(
                &job_id,
                StatusPatch {
                    stage: Some(spec.stage),
                    progress: Some(spec.floor),
                    message: Some(spec.message.to_string()),
                    current_step: Some(spec.step.to_string()),
                    completed_steps: Some(completed_steps),
                    estimated_time_remaining: Some(remaining_secs(total, started.elapsed())),
                    append_details: spec.details.iter().map(|d| d.to_string()).collect(),
                    result: None,
                },
            )
            .await;
        completed_steps += 1;
        tracing::debug!(
            job_id = %job_id,
            stage = spec.stage.as_str(),
            progress = spec.floor,
            "entered stage"
        );

        // Interpolate toward the next stage's floor, capped one unit below it
        // so progress never appears to reach a stage it hasn't entered. The
        // final stage interpolates toward 100; only the terminal write below
        // sets 100 itself.
        let next_floor = plan.stages.get(index + 1).map(|s| s.floor).unwrap_or(100);
        let span = f64::from(next_floor - spec.floor);
        let ticks = (spec.duration_secs * 1000 / config.tick_ms.max(1)).max(1);

        for elapsed_ticks in 1..=ticks {
            tokio::time::sleep(tick).await;

            match store.get(&job_id).await {
                None => return,
                Some(current) if current.is_terminal() => return,
                Some(_) => {}
            }

            let interpolated =
                spec.floor as f64 + span * (elapsed_ticks as f64 / ticks as f64);
            let capped = (interpolated as u8).min(next_floor.saturating_sub(1));
            store
                .merge(
                    &job_id,
                    StatusPatch {
                        progress: Some(capped),
                        estimated_time_remaining: Some(remaining_secs(total, started.elapsed())),
                        ..StatusPatch::default()
                    },
                )
                .await;
        }
    }

    match store.get(&job_id).await {
        None => return,
        Some(current) if current.is_terminal() => return,
        Some(_) => {}
    }

    store
        .merge(
            &job_id,
            StatusPatch {
                stage: Some(Stage::Completed),
                progress: Some(100),
                message: Some(plan.final_message.to_string()),
                current_step: None,
                completed_steps: Some(plan.total_steps),
                estimated_time_remaining: Some(0),
                append_details: vec![plan.final_detail.to_string()],
                result: Some(result),
            },
        )
        .await;
    tracing::info!(job_id = %job_id, "job completed");
}

fn remaining_secs(total: Duration, elapsed: Duration) -> u64 {
    total.saturating_sub(elapsed).as_secs()
}

/// Snapshot invariant checks shared by the timing tests.
#[cfg(test)]
fn assert_advances(earlier: &crate::status::JobStatus, later: &crate::status::JobStatus) {
    assert!(
        later.progress >= earlier.progress,
        "progress regressed: {} -> {}",
        earlier.progress,
        later.progress
    );
    assert!(
        later.details.starts_with(&earlier.details),
        "details are not append-only"
    );
    assert!(later.completed_steps >= earlier.completed_steps);
}
