//! Wall-clock formatting in the stations' local zone

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Default zone for both stations
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// Output layouts used across the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// `November 29 2024 at 4:59:10 PM`, used for session document ids
    Session,
    /// `11/29/24 at 4:59:10 PM`, sent with submissions
    Submission,
}

impl TimeFormat {
    const fn pattern(self) -> &'static str {
        match self {
            Self::Session => "%B %d %Y at %-I:%M:%S %p",
            Self::Submission => "%m/%d/%y at %-I:%M:%S %p",
        }
    }
}

/// Format an instant in the given zone
#[must_use]
pub fn format_at(instant: DateTime<Utc>, format: TimeFormat, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format(format.pattern())
        .to_string()
}

/// Format the current time in the given zone
#[must_use]
pub fn format_now(format: TimeFormat, tz: Tz) -> String {
    format_at(Utc::now(), format, tz)
}

/// Midnight of the most recent Sunday (inclusive of today) in `tz`
#[must_use]
pub fn week_start(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = instant.with_timezone(&tz);
    let days_since_sunday = i64::from(local.weekday().num_days_from_sunday());
    let sunday = local.date_naive() - Duration::days(days_since_sunday);
    let midnight = sunday.and_time(NaiveTime::MIN);

    // Midnight can be skipped or repeated by a DST shift in some zones
    tz.from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// Parse an IANA zone name
///
/// # Errors
///
/// Returns a config error when the name is not a known zone
pub fn parse_timezone(name: &str) -> crate::Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| crate::Error::Config(format!("invalid timezone {name:?}: {e}")))
}
