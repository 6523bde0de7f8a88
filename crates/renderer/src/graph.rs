//! Graph description and axis layout.
//!
//! A [`GraphSpec`] is everything a [`GraphRenderer`] needs to draw a time
//! series graph: lines with their labels, the axis extents and the output
//! size. Building it does the data-dependent work (extents, padding), so
//! renderers only deal with pixels.

use chrono::{DateTime, FixedOffset, TimeZone};

use fews_common::time::source_offset;
use fews_common::{DateRange, FewsResult, ValueSeries};

/// Fraction of the value span added above and below the data.
pub const VALUE_PADDING: f64 = 0.05;

/// Pad applied on both sides of a flat series.
pub const FLAT_PADDING: f64 = 1.0;

/// Line colors, cycled per series.
pub const SERIES_COLORS: [[u8; 3]; 6] = [
    [31, 119, 180],
    [214, 39, 40],
    [44, 160, 44],
    [255, 127, 14],
    [148, 103, 189],
    [140, 86, 75],
];

/// Draws a graph into encoded PNG bytes.
pub trait GraphRenderer: Send + Sync {
    fn render(&self, spec: &GraphSpec) -> FewsResult<Vec<u8>>;
}

/// One line on the graph. `None` values break the line.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphLine {
    pub label: String,
    /// Milliseconds since the epoch, value.
    pub points: Vec<(i64, Option<f64>)>,
}

impl GraphLine {
    pub fn has_values(&self) -> bool {
        self.points.iter().any(|(_, v)| v.is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphSpec {
    pub title: String,
    /// Vertical axis caption, usually the unit.
    pub value_label: Option<String>,
    pub lines: Vec<GraphLine>,
    /// Inclusive time extent in epoch milliseconds.
    pub time_extent: (i64, i64),
    pub value_extent: (f64, f64),
    pub width: u32,
    pub height: u32,
}

impl GraphSpec {
    /// Describe a graph of `series`. `range` supplies the time axis when the
    /// series carry no events.
    pub fn from_series(series: &[ValueSeries], range: &DateRange, width: u32, height: u32) -> Self {
        let title = series
            .first()
            .map(|s| s.parameter.name.clone())
            .unwrap_or_default();
        let value_label = series.first().and_then(|s| s.parameter.unit.clone());

        let lines: Vec<GraphLine> = series
            .iter()
            .map(|s| GraphLine {
                label: s.location.name.clone(),
                points: s
                    .events()
                    .iter()
                    .map(|e| (e.timestamp.timestamp_millis(), e.value))
                    .collect(),
            })
            .collect();

        let time_extent = time_extent(series, range);
        let value_extent = value_extent(series);

        Self {
            title,
            value_label,
            lines,
            time_extent,
            value_extent,
            width,
            height,
        }
    }

    /// True when there is no value to draw at all.
    pub fn is_empty(&self) -> bool {
        !self.lines.iter().any(GraphLine::has_values)
    }
}

fn time_extent(series: &[ValueSeries], range: &DateRange) -> (i64, i64) {
    let bounds = series
        .iter()
        .filter_map(|s| s.time_range())
        .map(|(a, b)| (a.timestamp_millis(), b.timestamp_millis()))
        .reduce(|(a0, b0), (a1, b1)| (a0.min(a1), b0.max(b1)));

    let (start, end) = match bounds {
        Some((start, end)) if end > start => (start, end),
        _ => (range.start.timestamp_millis(), range.end.timestamp_millis()),
    };

    if end > start {
        (start, end)
    } else {
        const HOUR_MS: i64 = 3_600_000;
        (start - HOUR_MS, start + HOUR_MS)
    }
}

/// Value axis extent. The data span is padded by [`VALUE_PADDING`]; a flat
/// series gets [`FLAT_PADDING`] on each side.
pub fn value_extent(series: &[ValueSeries]) -> (f64, f64) {
    let bounds = series
        .iter()
        .filter_map(|s| s.value_range())
        .reduce(|(a0, b0), (a1, b1)| (a0.min(a1), b0.max(b1)));

    let (lo, hi) = match bounds {
        None => return (0.0, 1.0),
        Some((min, max)) if max - min <= f64::EPSILON => (min - FLAT_PADDING, max + FLAT_PADDING),
        Some((min, max)) => {
            let pad = (max - min) * VALUE_PADDING;
            (min - pad, max + pad)
        }
    };

    if lo.is_finite() && hi.is_finite() && (hi - lo).is_finite() {
        (lo, hi)
    } else {
        // The padded span overflows f64: keep the axis finite and drawable.
        let (min, max) = bounds.unwrap_or((0.0, 1.0));
        (
            min.max(-MAX_AXIS_VALUE),
            max.min(MAX_AXIS_VALUE).max(min.max(-MAX_AXIS_VALUE) + 1.0),
        )
    }
}

/// Largest magnitude kept on the value axis, so `max - min` never overflows.
const MAX_AXIS_VALUE: f64 = f64::MAX / 4.0;

/// Upper bound on ticks returned by [`value_ticks`].
const MAX_TICKS: usize = 64;

/// Roughly `target` round-numbered ticks within `[min, max]`.
pub fn value_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !min.is_finite() || !max.is_finite() || !(max > min) || target == 0 {
        return Vec::new();
    }

    let step = nice_step((max - min) / target as f64);
    if !step.is_finite() || step <= 0.0 {
        return Vec::new();
    }
    let first = (min / step).ceil() * step;
    if !first.is_finite() {
        return Vec::new();
    }

    let mut ticks = Vec::new();
    for i in 0..MAX_TICKS {
        let tick = first + step * i as f64;
        if !tick.is_finite() || tick > max + step * 1e-9 {
            break;
        }
        // Clamp -0.0 and float noise around zero.
        ticks.push(if tick.abs() < step * 1e-9 { 0.0 } else { tick });
    }
    ticks
}

fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Format a value tick with just enough decimals for its step.
pub fn format_value_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 {
        0
    } else {
        (-step.log10().floor()) as usize
    };
    format!("{:.*}", decimals, value)
}

/// `count` evenly spaced time ticks with labels in source local time.
pub fn time_ticks(start_ms: i64, end_ms: i64, count: usize) -> Vec<(i64, String)> {
    if end_ms <= start_ms || count < 2 {
        return Vec::new();
    }

    let span = end_ms - start_ms;
    let format = if span > 2 * 86_400_000 {
        "%Y-%m-%d"
    } else {
        "%d-%m %H:%M"
    };

    (0..count)
        .filter_map(|i| {
            let ms = start_ms + span * i as i64 / (count - 1) as i64;
            let dt: DateTime<FixedOffset> = source_offset().timestamp_millis_opt(ms).single()?;
            Some((ms, dt.format(format).to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nice_ticks_cover_range() {
        let ticks = value_ticks(0.03, 0.97, 5);
        assert_eq!(ticks.len(), 4);
        assert!((ticks[0] - 0.2).abs() < 1e-9);
        assert!((ticks[3] - 0.8).abs() < 1e-9);
        assert!(value_ticks(1.0, 1.0, 5).is_empty());
    }

    #[test]
    fn test_ticks_through_zero() {
        let ticks = value_ticks(-2.0, 2.0, 4);
        assert!(ticks.contains(&0.0));
        assert!(ticks.iter().all(|t| *t >= -2.0 && *t <= 2.0));
    }

    #[test]
    fn test_ticks_on_unbounded_extent_are_empty() {
        assert!(value_ticks(f64::NEG_INFINITY, f64::INFINITY, 5).is_empty());
        assert!(value_ticks(f64::NAN, 1.0, 5).is_empty());
        assert!(value_ticks(-f64::MAX, f64::MAX, 5).len() <= MAX_TICKS);
    }

    #[test]
    fn test_tick_formatting() {
        assert_eq!(format_value_tick(2.0, 1.0), "2");
        assert_eq!(format_value_tick(0.25, 0.05), "0.25");
        assert_eq!(format_value_tick(1.5, 0.5), "1.5");
    }

    #[test]
    fn test_time_ticks_are_local() {
        // 2011-01-01T00:00:00+01:00 .. +1 day
        let start = 1_293_836_400_000;
        let ticks = time_ticks(start, start + 86_400_000, 3);
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].1, "01-01 00:00");
        assert_eq!(ticks[1].1, "01-01 12:00");
    }
}
