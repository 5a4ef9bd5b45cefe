// crates/core/src/watch.rs
//! Poll-based status broadcasting.
//!
//! Each observer gets its own polling stream over the shared store. There is
//! no fan-out channel; N observers of one job cost N reads per poll, which is
//! fine at this scale and keeps observers fully isolated from each other and
//! from the stage runner.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::Stream;

use crate::status::JobStatus;
use crate::store::StatusStore;

/// One item on a watch stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Status(JobStatus),
    /// The job was unknown when the watch started. Emitted at most once, as
    /// the only item on the stream.
    NotFound,
}

/// Stream snapshots of a job until it reaches a terminal stage.
///
/// Emits the current snapshot immediately, then one snapshot per poll
/// interval. The snapshot carrying the terminal stage is the last item. If
/// the record disappears mid-watch (swept or withdrawn) the stream ends
/// without a final event.
pub fn watch_job(
    store: Arc<StatusStore>,
    job_id: String,
    poll: Duration,
) -> impl Stream<Item = WatchEvent> + Send + 'static {
    async_stream::stream! {
        let Some(initial) = store.get(&job_id).await else {
            yield WatchEvent::NotFound;
            return;
        };
        let terminal = initial.is_terminal();
        yield WatchEvent::Status(initial);
        if terminal {
            return;
        }

        loop {
            tokio::time::sleep(poll).await;
            let Some(current) = store.get(&job_id).await else {
                tracing::debug!(job_id = %job_id, "record gone mid-watch, closing stream");
                return;
            };
            let terminal = current.is_terminal();
            yield WatchEvent::Status(current);
            if terminal {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::registry::JobRegistry;
    use crate::status::Stage;
    use tokio_stream::StreamExt;

    fn registry() -> JobRegistry {
        JobRegistry::new(Arc::new(StatusStore::in_memory()), TrackerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_yields_single_not_found() {
        let registry = registry();
        let mut stream = Box::pin(registry.watch("job_0_missing"));
        assert_eq!(stream.next().await, Some(WatchEvent::NotFound));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_with_terminal_snapshot() {
        let registry = registry();
        let created = registry.create_generation("Climate report").await.unwrap();

        let mut stream = Box::pin(registry.watch(&created.job_id));
        let mut last = None;
        let mut last_progress = 0u8;
        while let Some(event) = stream.next().await {
            let WatchEvent::Status(status) = event else {
                panic!("unexpected not-found for a live job");
            };
            assert!(status.progress >= last_progress);
            last_progress = status.progress;
            last = Some(status);
        }

        let last = last.expect("at least one snapshot");
        assert_eq!(last.stage, Stage::Completed);
        assert_eq!(last.progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_job_yields_single_snapshot() {
        let registry = registry();
        let created = registry.create_generation("Climate report").await.unwrap();
        registry.cancel(&created.job_id).await.unwrap();

        let mut stream = Box::pin(registry.watch(&created.job_id));
        match stream.next().await {
            Some(WatchEvent::Status(status)) => assert_eq!(status.stage, Stage::Failed),
            other => panic!("expected a terminal snapshot, got {other:?}"),
        }
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_closes_when_record_is_swept() {
        let registry = registry();
        let created = registry.create_generation("Climate report").await.unwrap();

        let mut stream = Box::pin(registry.watch(&created.job_id));
        assert!(matches!(stream.next().await, Some(WatchEvent::Status(_))));

        registry.store().remove(&created.job_id).await;
        assert_eq!(stream.next().await, None);
    }
}
