//! Domain model: filters, parameters, locations and value series.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::time::DateRange;

/// Parent id FEWS uses for top-level filters.
pub const JDBC_NONE: &str = "-999";

/// Value FEWS uses for a missing measurement.
pub const MISSING_VALUE: f64 = -999.0;

/// Map a raw parent id to `None` when it denotes "no parent".
pub fn normalize_parent(raw: Option<&str>) -> Option<String> {
    match raw.map(str::trim) {
        None | Some("") | Some(JDBC_NONE) => None,
        Some(id) => Some(id.to_string()),
    }
}

/// A node in the filter hierarchy. The parent is a lookup key, not ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterNode {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "parentid")]
    pub parent_id: Option<String>,
}

impl FilterNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: normalize_parent(parent_id),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A measured quantity available under a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    /// Display name, e.g. "Waterlevel".
    pub name: String,
    pub unit: Option<String>,
    pub filter_id: String,
}

/// A measurement station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub filter_ids: Vec<String>,
}

impl Location {
    pub fn coordinate(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    /// Squared planar distance in degrees, good enough for ranking nearby hits.
    pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.longitude - x;
        let dy = self.latitude - y;
        dx * dx + dy * dy
    }
}

/// One measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<FixedOffset>,
    /// `None` for NULL or the FEWS missing marker.
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Event {
    pub fn new(timestamp: DateTime<FixedOffset>, value: Option<f64>) -> Self {
        Self {
            timestamp,
            value: value.filter(|v| v.is_finite() && *v != MISSING_VALUE),
            flag: None,
            detection: None,
            comment: None,
        }
    }
}

/// Time-ordered values for one (source, parameter, location) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSeries {
    pub source: String,
    pub parameter: Parameter,
    pub location: Location,
    pub range: DateRange,
    events: Vec<Event>,
}

impl ValueSeries {
    /// Build a series, sorting events and dropping repeated timestamps so that
    /// timestamps are strictly increasing. The first event per timestamp wins.
    pub fn new(
        source: impl Into<String>,
        parameter: Parameter,
        location: Location,
        range: DateRange,
        mut events: Vec<Event>,
    ) -> Self {
        events.sort_by_key(|e| e.timestamp);
        events.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);

        Self {
            source: source.into(),
            parameter,
            location,
            range,
            events,
        }
    }

    pub fn empty(
        source: impl Into<String>,
        parameter: Parameter,
        location: Location,
        range: DateRange,
    ) -> Self {
        Self::new(source, parameter, location, range, Vec::new())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Min and max of the present values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.events
            .iter()
            .filter_map(|e| e.value)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// First and last timestamp.
    pub fn time_range(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}
