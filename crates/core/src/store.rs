// crates/core/src/store.rs
//! Keyed persistence for job status records.
//!
//! Two backends, chosen once at process start: an in-memory map, or a shared
//! Redis cache where every record carries a TTL equal to the retention
//! window. The Redis backend degrades one-way to the in-memory map on the
//! first connection or command error, so job processing never fails purely
//! because the cache is unreachable.
//!
//! All mutation goes through [`StatusStore::put`] and [`StatusStore::merge`];
//! no component holds an aliasable reference to a live record. `merge` is the
//! only read-modify-write operation and runs under a store-level async mutex,
//! which is the per-key critical section (job volume is modest enough that
//! one lock for the whole store suffices).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::status::{JobResult, JobStatus, Stage};

/// Internal backend fault; absorbed by the fallback path, never surfaced.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("redis command error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),
}

/// Which backend the store is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// In-memory map, chosen at startup.
    Local,
    /// Redis with per-record TTL.
    Remote,
    /// Started remote, fell back to the in-memory map after an error.
    Degraded,
}

impl StoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreMode::Local => "local",
            StoreMode::Remote => "remote",
            StoreMode::Degraded => "degraded",
        }
    }
}

/// Partial update applied by [`StatusStore::merge`].
///
/// `job_id` and `start_time` are deliberately not representable here; they
/// are immutable after creation. `append_details` extends the existing
/// detail log and never replaces it.
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub stage: Option<Stage>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub current_step: Option<String>,
    pub completed_steps: Option<u32>,
    pub estimated_time_remaining: Option<u64>,
    pub append_details: Vec<String>,
    pub result: Option<JobResult>,
}

impl StatusPatch {
    /// The single write the cancellation gate performs.
    pub fn cancelled() -> Self {
        Self {
            stage: Some(Stage::Failed),
            message: Some("Job cancelled by user".to_string()),
            estimated_time_remaining: Some(0),
            ..Self::default()
        }
    }

    fn apply(self, mut status: JobStatus) -> JobStatus {
        if let Some(stage) = self.stage {
            status.stage = stage;
        }
        if let Some(progress) = self.progress {
            // Progress is monotone for live jobs; a stale writer can only
            // hold it in place, never drag it backwards.
            status.progress = status.progress.max(progress);
        }
        if let Some(message) = self.message {
            status.message = message;
        }
        if let Some(step) = self.current_step {
            status.current_step = step;
        }
        if let Some(steps) = self.completed_steps {
            status.completed_steps = steps.min(status.total_steps);
        }
        if let Some(eta) = self.estimated_time_remaining {
            status.estimated_time_remaining = eta;
        }
        status.details.extend(self.append_details);
        if let Some(result) = self.result {
            status.result = Some(result);
        }
        status
    }
}

/// Status record store with a local map and an optional Redis backend.
///
/// The local map always holds a mirror of every record written by this
/// process, so a mid-run degrade keeps in-flight jobs readable and lets them
/// reach a terminal state.
pub struct StatusStore {
    local: Mutex<HashMap<String, JobStatus>>,
    remote: Option<Pool>,
    degraded: AtomicBool,
    ttl_secs: u64,
    /// Serializes read-modify-write cycles in `merge`.
    merge_lock: Mutex<()>,
}

impl StatusStore {
    /// A store backed purely by the in-memory map. Records never self-expire;
    /// pair it with the retention sweeper.
    pub fn in_memory() -> Self {
        Self {
            local: Mutex::new(HashMap::new()),
            remote: None,
            degraded: AtomicBool::new(false),
            ttl_secs: 0,
            merge_lock: Mutex::new(()),
        }
    }

    /// Connect the Redis backend, verifying connectivity with one round trip.
    /// Falls back to [`StatusStore::in_memory`] if the cache is unreachable,
    /// so startup never fails on a missing Redis.
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Self {
        let pool = match RedisConfig::from_url(redis_url).create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => pool,
            Err(err) => {
                tracing::warn!(error = %err, "invalid redis configuration, using in-memory store");
                return Self::in_memory();
            }
        };

        let probe: Result<Option<String>, StoreError> = async {
            let mut conn = pool.get().await?;
            // Any round trip proves connectivity; GET on a sentinel key avoids
            // version-sensitive command plumbing.
            Ok(conn.get("docflow:probe").await?)
        }
        .await;

        match probe {
            Ok(_) => {
                tracing::info!(ttl_secs, "connected to redis status store");
                Self::with_pool(pool, ttl_secs)
            }
            Err(err) => {
                tracing::warn!(error = %err, "redis unreachable at startup, using in-memory store");
                Self::in_memory()
            }
        }
    }

    fn with_pool(pool: Pool, ttl_secs: u64) -> Self {
        Self {
            local: Mutex::new(HashMap::new()),
            remote: Some(pool),
            degraded: AtomicBool::new(false),
            ttl_secs,
            merge_lock: Mutex::new(()),
        }
    }

    /// Test hook: a "remote" store whose pool has never been probed.
    #[cfg(test)]
    pub(crate) fn with_unprobed_pool(pool: Pool, ttl_secs: u64) -> Self {
        Self::with_pool(pool, ttl_secs)
    }

    pub fn mode(&self) -> StoreMode {
        match &self.remote {
            None => StoreMode::Local,
            Some(_) if self.degraded.load(Ordering::SeqCst) => StoreMode::Degraded,
            Some(_) => StoreMode::Remote,
        }
    }

    /// True while records expire on their own (healthy Redis TTL).
    pub fn self_expires(&self) -> bool {
        self.mode() == StoreMode::Remote
    }

    /// Fetch the current record, if any.
    pub async fn get(&self, job_id: &str) -> Option<JobStatus> {
        if let Some(pool) = self.active_pool() {
            match self.remote_get(pool, job_id).await {
                Ok(found) => return found,
                Err(err) => self.degrade(&err),
            }
        }
        self.local.lock().await.get(job_id).cloned()
    }

    /// Write a full record. In remote mode the record also lands in the local
    /// mirror so a later degrade does not lose in-flight jobs.
    pub async fn put(&self, job_id: &str, status: JobStatus) {
        if let Some(pool) = self.active_pool() {
            if let Err(err) = self.remote_put(pool, job_id, &status).await {
                self.degrade(&err);
            }
        }
        self.local.lock().await.insert(job_id.to_string(), status);
    }

    /// Read-modify-write under the store's critical section.
    ///
    /// Returns `None` when no record exists. A terminal record is returned
    /// unchanged: completed and failed jobs are immutable, and enforcing that
    /// here closes the race between the stage runner's writes and the
    /// cancellation gate.
    pub async fn merge(&self, job_id: &str, patch: StatusPatch) -> Option<JobStatus> {
        let _guard = self.merge_lock.lock().await;
        let current = self.get(job_id).await?;
        if current.is_terminal() {
            tracing::debug!(
                job_id,
                stage = current.stage.as_str(),
                "ignoring merge into terminal record"
            );
            return Some(current);
        }
        let updated = patch.apply(current);
        self.put(job_id, updated.clone()).await;
        Some(updated)
    }

    /// Remove a record from every backend.
    pub async fn remove(&self, job_id: &str) {
        if let Some(pool) = self.active_pool() {
            if let Err(err) = self.remote_remove(pool, job_id).await {
                self.degrade(&err);
            }
        }
        self.local.lock().await.remove(job_id);
    }

    /// Ids currently held in the local map (the sweeper's scan set; in remote
    /// mode this is the fallback mirror).
    pub async fn job_ids(&self) -> Vec<String> {
        self.local.lock().await.keys().cloned().collect()
    }

    fn active_pool(&self) -> Option<&Pool> {
        if self.degraded.load(Ordering::SeqCst) {
            None
        } else {
            self.remote.as_ref()
        }
    }

    /// One-way transition to the local backend, logged once.
    fn degrade(&self, err: &StoreError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                error = %err,
                "redis status store unavailable, continuing on the in-memory backend"
            );
        }
    }

    async fn remote_get(&self, pool: &Pool, job_id: &str) -> Result<Option<JobStatus>, StoreError> {
        let mut conn = pool.get().await?;
        let raw: Option<String> = conn.get(Self::key(job_id)).await?;
        Ok(raw.and_then(|payload| match serde_json::from_str(&payload) {
            Ok(status) => Some(status),
            Err(err) => {
                tracing::warn!(job_id, error = %err, "discarding malformed status record");
                None
            }
        }))
    }

    async fn remote_put(
        &self,
        pool: &Pool,
        job_id: &str,
        status: &JobStatus,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(status).unwrap_or_default();
        let mut conn = pool.get().await?;
        conn.set_ex::<_, _, ()>(Self::key(job_id), payload, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn remote_remove(&self, pool: &Pool, job_id: &str) -> Result<(), StoreError> {
        let mut conn = pool.get().await?;
        conn.del::<_, ()>(Self::key(job_id)).await?;
        Ok(())
    }

    fn key(job_id: &str) -> String {
        format!("job:{job_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::epoch_millis;
    use pretty_assertions::assert_eq;

    fn record(job_id: &str, stage: Stage, progress: u8) -> JobStatus {
        JobStatus {
            job_id: job_id.to_string(),
            stage,
            progress,
            message: "Starting document generation...".to_string(),
            current_step: "Initializing".to_string(),
            total_steps: 5,
            completed_steps: 0,
            estimated_time_remaining: 1800,
            details: vec!["Job created".to_string()],
            start_time: epoch_millis(),
            result: None,
        }
    }

    /// A pool pointing at a port nothing listens on; every operation errors.
    fn dead_pool() -> Pool {
        RedisConfig::from_url("redis://127.0.0.1:1/")
            .create_pool(Some(Runtime::Tokio1))
            .expect("pool construction is offline")
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = StatusStore::in_memory();
        let status = record("job_a", Stage::Initializing, 0);
        store.put("job_a", status.clone()).await;
        assert_eq!(store.get("job_a").await, Some(status));
        assert_eq!(store.get("job_missing").await, None);
    }

    #[tokio::test]
    async fn test_merge_applies_fields_and_appends_details() {
        let store = StatusStore::in_memory();
        store.put("job_a", record("job_a", Stage::Initializing, 0)).await;

        let updated = store
            .merge(
                "job_a",
                StatusPatch {
                    stage: Some(Stage::Analyzing),
                    progress: Some(10),
                    message: Some("Analyzing prompt and gathering context...".to_string()),
                    current_step: Some("Analyzing input".to_string()),
                    completed_steps: Some(1),
                    estimated_time_remaining: Some(28),
                    append_details: vec!["Parsing prompt structure".to_string()],
                    result: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.stage, Stage::Analyzing);
        assert_eq!(updated.progress, 10);
        assert_eq!(updated.completed_steps, 1);
        assert_eq!(
            updated.details,
            vec!["Job created".to_string(), "Parsing prompt structure".to_string()]
        );
        // Identity fields untouched.
        assert_eq!(updated.job_id, "job_a");
    }

    #[tokio::test]
    async fn test_merge_missing_record_returns_none() {
        let store = StatusStore::in_memory();
        let outcome = store.merge("job_missing", StatusPatch::cancelled()).await;
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_merge_never_touches_terminal_record() {
        let store = StatusStore::in_memory();
        let mut done = record("job_a", Stage::Completed, 100);
        done.estimated_time_remaining = 0;
        store.put("job_a", done.clone()).await;

        let after = store
            .merge(
                "job_a",
                StatusPatch {
                    stage: Some(Stage::Failed),
                    progress: Some(10),
                    estimated_time_remaining: Some(500),
                    append_details: vec!["should not appear".to_string()],
                    ..StatusPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(after, done);
        assert_eq!(store.get("job_a").await, Some(done));
    }

    #[tokio::test]
    async fn test_merge_progress_is_monotone() {
        let store = StatusStore::in_memory();
        store.put("job_a", record("job_a", Stage::Generating, 42)).await;

        let after = store
            .merge(
                "job_a",
                StatusPatch {
                    progress: Some(30),
                    ..StatusPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(after.progress, 42);
    }

    #[tokio::test]
    async fn test_merge_caps_completed_steps() {
        let store = StatusStore::in_memory();
        store.put("job_a", record("job_a", Stage::Finalizing, 90)).await;

        let after = store
            .merge(
                "job_a",
                StatusPatch {
                    completed_steps: Some(99),
                    ..StatusPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(after.completed_steps, after.total_steps);
    }

    #[tokio::test]
    async fn test_remove_and_job_ids() {
        let store = StatusStore::in_memory();
        store.put("job_a", record("job_a", Stage::Initializing, 0)).await;
        store.put("job_b", record("job_b", Stage::Analyzing, 10)).await;

        let mut ids = store.job_ids().await;
        ids.sort();
        assert_eq!(ids, vec!["job_a".to_string(), "job_b".to_string()]);

        store.remove("job_a").await;
        assert_eq!(store.get("job_a").await, None);
        assert_eq!(store.job_ids().await, vec!["job_b".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_failure_degrades_to_local_once() {
        let store = StatusStore::with_unprobed_pool(dead_pool(), 7200);
        assert_eq!(store.mode(), StoreMode::Remote);

        // First write hits the dead pool, flips the degrade flag, and still
        // lands in the local mirror.
        let status = record("job_a", Stage::Initializing, 0);
        store.put("job_a", status.clone()).await;
        assert_eq!(store.mode(), StoreMode::Degraded);
        assert_eq!(store.get("job_a").await, Some(status));

        // Degrade is one-way: further operations stay local and keep working.
        let updated = store
            .merge(
                "job_a",
                StatusPatch {
                    progress: Some(10),
                    ..StatusPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.progress, 10);
        assert_eq!(store.mode(), StoreMode::Degraded);
        assert!(!store.self_expires());
    }

    #[tokio::test]
    async fn test_in_memory_mode_reports_local() {
        let store = StatusStore::in_memory();
        assert_eq!(store.mode(), StoreMode::Local);
        assert!(!store.self_expires());
        assert_eq!(StoreMode::Local.as_str(), "local");
        assert_eq!(StoreMode::Remote.as_str(), "remote");
        assert_eq!(StoreMode::Degraded.as_str(), "degraded");
    }
}
