//! Weekly purge of conversation data
//!
//! Each run deletes the sessions and submissions whose timestamps fall in
//! the previous calendar week (Sunday 00:00 to Sunday 00:00, local time).

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::{SessionRepo, SubmissionRepo};
use crate::localtime::week_start;
use crate::station::{Station, StationRegistry};
use crate::{Error, Result};

/// What a cleanup run removed for one station
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub station: String,
    pub sessions_deleted: usize,
    pub submissions_deleted: usize,
}

/// Deletes last week's sessions and submissions for every station
#[derive(Clone)]
pub struct CleanupJob {
    sessions: SessionRepo,
    submissions: SubmissionRepo,
    stations: StationRegistry,
    timezone: Tz,
}

/// `[start of previous week, start of current week)` around `now`
#[must_use]
pub fn cleanup_window(now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = week_start(now, tz);
    let start = week_start(end - Duration::days(1), tz);
    (start, end)
}

impl CleanupJob {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(
        sessions: SessionRepo,
        submissions: SubmissionRepo,
        stations: StationRegistry,
        timezone: Tz,
    ) -> Self {
        Self {
            sessions,
            submissions,
            stations,
            timezone,
        }
    }

    /// Clean every station using the current time
    ///
    /// # Errors
    ///
    /// Returns error if any station's queries or deletes fail
    pub async fn run(&self) -> Result<Vec<CleanupReport>> {
        self.run_at(Utc::now()).await
    }

    /// Clean every station for the week before `now`
    ///
    /// Stations are processed concurrently.
    ///
    /// # Errors
    ///
    /// Returns error if any station's queries or deletes fail
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<Vec<CleanupReport>> {
        let (start, end) = cleanup_window(now, self.timezone);
        let (start_ms, end_ms) = (start.timestamp_millis(), end.timestamp_millis());

        let tasks = self.stations.iter().cloned().map(|station| {
            let sessions = self.sessions.clone();
            let submissions = self.submissions.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    clean_station(&sessions, &submissions, &station, start_ms, end_ms)
                })
                .await
                .map_err(|e| Error::Database(format!("cleanup task failed: {e}")))?
            }
        });

        let reports = futures::future::try_join_all(tasks).await?;

        tracing::info!(
            week_start = %start.to_rfc3339(),
            week_end = %end.to_rfc3339(),
            sessions_deleted = reports.iter().map(|r| r.sessions_deleted).sum::<usize>(),
            submissions_deleted = reports.iter().map(|r| r.submissions_deleted).sum::<usize>(),
            "cleanup completed for all stations"
        );

        Ok(reports)
    }
}

fn clean_station(
    sessions: &SessionRepo,
    submissions: &SubmissionRepo,
    station: &Station,
    start_ms: i64,
    end_ms: i64,
) -> Result<CleanupReport> {
    let session_ids = sessions.ids_active_between(station, start_ms, end_ms)?;
    let submission_ids = submissions.ids_created_between(station, start_ms, end_ms)?;

    let report = CleanupReport {
        station: station.id.clone(),
        sessions_deleted: sessions.delete_many(station, &session_ids)?,
        submissions_deleted: submissions.delete_many(station, &submission_ids)?,
    };

    tracing::info!(
        station = %station.id,
        sessions_deleted = report.sessions_deleted,
        submissions_deleted = report.submissions_deleted,
        "station cleaned"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::localtime::DEFAULT_TIMEZONE;

    #[test]
    fn test_window_is_previous_local_week() {
        // Wednesday 2024-11-27 15:00 CST
        let now = Utc.with_ymd_and_hms(2024, 11, 27, 21, 0, 0).unwrap();
        let (start, end) = cleanup_window(now, DEFAULT_TIMEZONE);

        // Sunday 2024-11-17 and 2024-11-24 at 00:00 CST (UTC-6)
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 11, 17, 6, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 11, 24, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_window_across_dst_change() {
        // DST ended Sunday 2024-11-03; the week before it is 7 days + 1 hour long
        let now = Utc.with_ymd_and_hms(2024, 11, 5, 18, 0, 0).unwrap();
        let (start, end) = cleanup_window(now, DEFAULT_TIMEZONE);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 10, 27, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 11, 3, 5, 0, 0).unwrap());
    }
}
