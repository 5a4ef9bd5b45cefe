// crates/core/src/sweeper.rs
//! Retention sweeper: evicts status records older than the retention window.
//!
//! The sweeper always walks the local map. In remote mode the local map is a
//! write-through mirror of every record this process created, so sweeping it
//! covers both backends; the remote copies also age out on their own via TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::status::epoch_millis;
use crate::store::StatusStore;

/// Fixed cadence between sweeps.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(300);

/// Run the sweeper until `shutdown` is cancelled.
pub async fn run_sweeper(
    store: Arc<StatusStore>,
    retention: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SWEEP_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; consume it so the first sweep happens
    // one full period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("retention sweeper stopped");
                return;
            }
            _ = ticker.tick() => {
                let evicted = sweep_once(&store, retention).await;
                if evicted > 0 {
                    tracing::info!(evicted, "swept expired job records");
                }
            }
        }
    }
}

/// Evict every record whose `start_time` is older than the retention window.
/// Returns the number of records removed. Age is measured from creation, not
/// from last update, so even a job wedged mid-run ages out.
pub async fn sweep_once(store: &StatusStore, retention: Duration) -> usize {
    let cutoff = epoch_millis() - retention.as_millis() as i64;
    let mut evicted = 0;

    for job_id in store.job_ids().await {
        let keep = match store.get(&job_id).await {
            Some(status) => status.start_time >= cutoff,
            None => false,
        };
        if !keep {
            store.remove(&job_id).await;
            evicted += 1;
        }
    }
    evicted
}
