//! Background maintenance jobs

pub mod cleanup;
pub mod document_sync;
pub mod vector_store;

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

pub use cleanup::{CleanupJob, CleanupReport, cleanup_window};
pub use document_sync::{DocumentSync, SyncReport};
pub use vector_store::{OptimizeOutcome, VectorStoreOptimizer};

use crate::Result;

/// Run `job` every `period` until the task is aborted
///
/// The first tick fires one full period after spawning. Failures are logged
/// and the schedule continues.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tracing::info!(job = name, interval_secs = period.as_secs(), "scheduled job");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            interval.tick().await;
            tracing::debug!(job = name, "job starting");
            if let Err(e) = job().await {
                tracing::warn!(job = name, error = %e, "job failed");
            }
        }
    })
}
