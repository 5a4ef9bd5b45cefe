// crates/server/src/state.rs
//! Shared application state for the Axum server.

use std::time::Instant;

use docflow_core::{JobRegistry, StatusStore, TrackerConfig};

/// Application state shared across all route handlers.
pub struct AppState {
    start_time: Instant,
    pub registry: JobRegistry,
}

impl AppState {
    pub fn new(registry: JobRegistry) -> Self {
        Self {
            start_time: Instant::now(),
            registry,
        }
    }

    /// In-memory state with default timings, for tests and local runs.
    pub fn in_memory() -> Self {
        let store = std::sync::Arc::new(StatusStore::in_memory());
        Self::new(JobRegistry::new(store, TrackerConfig::default()))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
