//! Run status polling

use std::time::{Duration, Instant};

use super::client::AssistantApi;
use super::types::{Run, RunStatus};
use crate::{Error, Result};

/// Default delay between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default budget for a run to settle
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(20);

/// Polls a run until it completes, needs tool output, or fails
#[derive(Debug, Clone, Copy)]
pub struct RunPoller {
    interval: Duration,
    timeout: Duration,
}

impl Default for RunPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT)
    }
}

impl RunPoller {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Wait for a run to settle
    ///
    /// Returns the run once it is `completed`, or `requires_action` when
    /// `allow_action` is set.
    ///
    /// # Errors
    ///
    /// - `RunFailed` on `failed`, `expired`, `cancelled`, any unexpected
    ///   status, or `requires_action` when not allowed
    /// - `RunTimeout` if the run is still queued or in progress after the
    ///   timeout
    /// - any error from the API itself
    pub async fn poll(
        &self,
        api: &dyn AssistantApi,
        thread_id: &str,
        run_id: &str,
        allow_action: bool,
    ) -> Result<Run> {
        let started = Instant::now();

        loop {
            let run = api.retrieve_run(thread_id, run_id).await?;
            tracing::debug!(thread_id, run_id, status = run.status.as_str(), "polled run");

            match run.status {
                RunStatus::Completed => return Ok(run),
                RunStatus::RequiresAction if allow_action => return Ok(run),
                RunStatus::RequiresAction => {
                    return Err(Error::RunFailed(
                        "requires_action (function calls not allowed)".to_string(),
                    ));
                }
                RunStatus::Failed | RunStatus::Expired | RunStatus::Cancelled => {
                    let detail = run
                        .last_error
                        .as_ref()
                        .map(|e| format!(" ({}: {})", e.code, e.message))
                        .unwrap_or_default();
                    tracing::warn!(thread_id, run_id, status = run.status.as_str(), "run ended unsuccessfully");
                    return Err(Error::RunFailed(format!("{}{detail}", run.status.as_str())));
                }
                RunStatus::Queued | RunStatus::InProgress => {
                    let elapsed = started.elapsed();
                    if elapsed > self.timeout {
                        tracing::warn!(thread_id, run_id, elapsed_ms = elapsed.as_millis(), "run timed out");
                        return Err(Error::RunTimeout(elapsed.as_millis()));
                    }
                    tokio::time::sleep(self.interval).await;
                }
                other => {
                    return Err(Error::RunFailed(format!("unexpected status {}", other.as_str())));
                }
            }
        }
    }
}
