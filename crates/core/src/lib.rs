// crates/core/src/lib.rs
//! Core job-lifecycle engine for docflow.
//!
//! Everything here is transport-agnostic: the registry creates jobs and
//! answers status/cancel requests, the stage runner advances records through
//! fixed plans, the watch module streams snapshots to observers, and the
//! sweeper evicts records past the retention window. The status store hides
//! whether records live in-process or in a shared Redis cache.

pub mod config;
pub mod error;
pub mod plan;
pub mod registry;
pub mod runner;
pub mod status;
pub mod store;
pub mod sweeper;
pub mod watch;

pub use config::TrackerConfig;
pub use error::JobError;
pub use registry::{CancelOutcome, JobRegistry, RefinementRequest};
pub use status::{JobResult, JobStatus, Stage};
pub use store::{StatusStore, StoreMode};
pub use watch::WatchEvent;
