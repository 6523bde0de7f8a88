//! Time handling for FEWS data.
//!
//! Every instant in this workspace is normalized to a fixed GMT+1 offset.
//! The FEWS JDBC views deliver naive timestamps in GMT+1, so naive input is
//! read as GMT+1 as well and the process' local timezone is never consulted.

use chrono::{
    DateTime, Duration, DurationRound, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{FewsError, FewsResult};

/// Offset of the data source's clock, in seconds east of UTC.
pub const SOURCE_OFFSET_SECS: i32 = 3600;

/// Timestamp layout used inside JDBC queries.
pub const JDBC_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Upper bound for `period`, about 270 years.
pub const MAX_PERIOD_DAYS: i64 = 100_000;

/// Default request window in days.
pub const DEFAULT_PERIOD_DAYS: i64 = 1000;

/// Naive layouts accepted in requests and returned by the source.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    // FEWS compact form, as delivered over XML-RPC
    "%Y%m%dT%H:%M:%S",
    "%Y%m%dT%H%M%S",
];

/// The fixed GMT+1 offset.
pub fn source_offset() -> FixedOffset {
    FixedOffset::east_opt(SOURCE_OFFSET_SECS).expect("GMT+1 is a valid offset")
}

/// Current time in GMT+1.
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&source_offset())
}

/// The current time rounded up to the next whole hour.
///
/// Relative windows end here, so requests within the same hour resolve to
/// the same range and share series cache entries.
pub fn window_anchor() -> DateTime<FixedOffset> {
    let now = now();
    now.duration_trunc(Duration::hours(1))
        .map(|hour| hour + Duration::hours(1))
        .unwrap_or(now)
}

/// Interpret a naive timestamp as GMT+1.
pub fn from_naive(ndt: NaiveDateTime) -> DateTime<FixedOffset> {
    let offset = source_offset();
    // A fixed offset has no gaps or folds, so the mapping is always unique.
    offset.from_utc_datetime(&(ndt - Duration::seconds(i64::from(SOURCE_OFFSET_SECS))))
}

/// Parse an ISO-8601 date or datetime into GMT+1.
///
/// Input with an explicit offset is converted; input without one is taken to
/// be GMT+1 already. A bare date means midnight.
pub fn parse_datetime(s: &str) -> FewsResult<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FewsError::InvalidDate("empty date".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&source_offset()));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(from_naive(ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(from_naive(ndt));
        }
    }

    Err(FewsError::InvalidDate(format!("cannot parse '{}'", s)))
}

/// Format an instant for use inside a JDBC query.
pub fn format_jdbc(dt: &DateTime<FixedOffset>) -> String {
    dt.with_timezone(&source_offset())
        .format(JDBC_DATE_FORMAT)
        .to_string()
}

/// Format an instant as ISO-8601 with the `+01:00` offset.
pub fn format_iso(dt: &DateTime<FixedOffset>) -> String {
    dt.with_timezone(&source_offset())
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

/// A closed time window. `start > end` is a valid, empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl DateRange {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        let offset = source_offset();
        Self {
            start: start.with_timezone(&offset),
            end: end.with_timezone(&offset),
        }
    }

    /// True when no instant can fall inside the range.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, dt: &DateTime<FixedOffset>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Stable text form, used in cache keys.
    pub fn key(&self) -> String {
        format!("{}/{}", format_iso(&self.start), format_iso(&self.end))
    }
}

/// Raw date inputs of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeInput {
    pub start: Option<String>,
    pub end: Option<String>,
    /// Days back from now.
    pub period: Option<i64>,
}

impl DateRangeInput {
    pub fn explicit(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            period: None,
        }
    }

    pub fn period(days: i64) -> Self {
        Self {
            start: None,
            end: None,
            period: Some(days),
        }
    }
}

/// Turns request date inputs into a [`DateRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRangeResolver {
    /// Size of the window used when a request carries no usable dates.
    pub default_period_days: i64,
}

impl Default for DateRangeResolver {
    fn default() -> Self {
        Self {
            default_period_days: DEFAULT_PERIOD_DAYS,
        }
    }
}

impl DateRangeResolver {
    pub fn new(default_period_days: i64) -> Self {
        Self {
            default_period_days,
        }
    }

    /// Resolve against the current time, see [`window_anchor`].
    pub fn resolve(&self, input: &DateRangeInput) -> FewsResult<DateRange> {
        self.resolve_at(input, window_anchor())
    }

    /// Resolve against a given "now".
    ///
    /// Priority: explicit `start` + `end`, then `period`, then the default
    /// window. A lone `start` or `end` keeps its value and takes the other
    /// bound from the default window. Dates a rule ignores are not parsed.
    pub fn resolve_at(
        &self,
        input: &DateRangeInput,
        now: DateTime<FixedOffset>,
    ) -> FewsResult<DateRange> {
        let start = non_blank(input.start.as_deref());
        let end = non_blank(input.end.as_deref());

        match (start, end, input.period) {
            (Some(start), Some(end), _) => {
                Ok(DateRange::new(parse_datetime(start)?, parse_datetime(end)?))
            }
            (_, _, Some(days)) => {
                let start = days_before(now, days)?;
                Ok(DateRange::new(start, now))
            }
            (start, end, None) => {
                let start = match start {
                    Some(s) => parse_datetime(s)?,
                    None => days_before(now, self.default_period_days)?,
                };
                let end = match end {
                    Some(s) => parse_datetime(s)?,
                    None => now,
                };
                Ok(DateRange::new(start, end))
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn days_before(now: DateTime<FixedOffset>, days: i64) -> FewsResult<DateTime<FixedOffset>> {
    if days < 0 {
        return Err(FewsError::InvalidDate(format!(
            "period must not be negative, got {}",
            days
        )));
    }
    if days > MAX_PERIOD_DAYS {
        return Err(FewsError::InvalidDate(format!(
            "period of {} days is out of range",
            days
        )));
    }
    now.checked_sub_signed(Duration::days(days))
        .ok_or_else(|| FewsError::InvalidDate(format!("period of {} days is out of range", days)))
}
