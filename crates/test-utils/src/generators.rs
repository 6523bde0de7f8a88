//! Generators for synthetic value series.

use chrono::{Duration, NaiveDateTime};

use fews_common::time::{from_naive, parse_datetime};
use fews_common::{DateRange, Event, Location, Parameter, ValueSeries};

/// `count` timestamps one hour apart, starting at `start`.
pub fn hourly_times(start: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    (0..count)
        .map(|i| start + Duration::hours(i as i64))
        .collect()
}

/// Build a series with one event per `step_hours`, starting at `start`.
///
/// `None` entries become events without a value.
///
/// # Example
///
/// ```
/// use test_utils::{series_from_values, waterlevel, location_a};
///
/// let series = series_from_values(waterlevel(), location_a(), "2011-01-01", 1, &[Some(1.0), None]);
/// assert_eq!(series.len(), 2);
/// ```
pub fn series_from_values(
    parameter: Parameter,
    location: Location,
    start: &str,
    step_hours: i64,
    values: &[Option<f64>],
) -> ValueSeries {
    let start = parse_datetime(start).expect("generator start must be a valid date");
    let events: Vec<Event> = values
        .iter()
        .enumerate()
        .map(|(i, v)| Event::new(start + Duration::hours(i as i64 * step_hours), *v))
        .collect();

    let end = events.last().map(|e| e.timestamp).unwrap_or(start);
    ValueSeries::new(
        "fews",
        parameter,
        location,
        DateRange::new(start, end),
        events,
    )
}

/// A day-long tidal curve, hourly.
pub fn tidal_series(parameter: Parameter, location: Location, amplitude: f64) -> ValueSeries {
    let values: Vec<Option<f64>> = (0..24)
        .map(|i| {
            let phase = i as f64 / 12.42 * std::f64::consts::TAU;
            Some(amplitude * phase.sin())
        })
        .collect();
    series_from_values(parameter, location, "2011-01-01T00:00:00", 1, &values)
}

/// Interpret a `YYYY-MM-DD HH:MM:SS` string as GMT+1.
pub fn gmt1(s: &str) -> chrono::DateTime<chrono::FixedOffset> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .expect("generator timestamp must be valid");
    from_naive(naive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{location_a, waterlevel};

    #[test]
    fn test_hourly_times() {
        let start = NaiveDateTime::parse_from_str("2011-01-01 22:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let times = hourly_times(start, 3);
        assert_eq!(times[2].to_string(), "2011-01-02 00:00:00");
    }

    #[test]
    fn test_tidal_series_range() {
        let series = tidal_series(waterlevel(), location_a(), 2.0);
        assert_eq!(series.len(), 24);
        let (lo, hi) = series.value_range().unwrap();
        assert!(lo >= -2.0 && hi <= 2.0);
        assert!(hi > 1.5);
    }
}
