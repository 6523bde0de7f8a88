//! FEWS fixtures shared by the test suites.
//!
//! The dataset mimics a small FEWS installation: a filter tree of four
//! levels, two parameters and two stations with a day of values each.

use std::sync::Arc;

use chrono::NaiveDateTime;

use fews_common::time::parse_datetime;
use fews_common::{DateRange, Location, Parameter};
use jdbc_source::{BackendKind, MemoryDataset, MemoryExecutor, SourceDescriptor, SourceModel};

use crate::generators::hourly_times;

pub const SOURCE_SLUG: &str = "fews";
pub const ROOT_FILTER: &str = "root";
pub const FILTER_ID: &str = "MFPS";
pub const SUB_FILTER_ID: &str = "MFPS_NOORD";
pub const DISCHARGE_FILTER_ID: &str = "DEBIET";
pub const PARAMETER_ID: &str = "H.meting";
pub const PARAMETER_NAME: &str = "Waterlevel";
pub const DISCHARGE_ID: &str = "Q.meting";
pub const LOCATION_A: &str = "BW_NZ_04";
pub const LOCATION_B: &str = "BW_RD_01";

/// First and last timestamp present in the dataset (GMT+1).
pub const DATA_START: &str = "2011-01-01T00:00:00";
pub const DATA_END: &str = "2011-01-01T23:00:00";

/// Hour at which station A reports the FEWS missing marker.
pub const MISSING_HOUR: usize = 5;

/// Station coordinates (lon, lat).
pub mod coords {
    pub const LOCATION_A: (f64, f64) = (4.70, 52.90);
    pub const LOCATION_B: (f64, f64) = (5.10, 51.95);
}

fn start() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2011-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
        .expect("fixture start is valid")
}

/// The full in-memory dataset.
pub fn fews_dataset() -> MemoryDataset {
    let mut dataset = MemoryDataset::new()
        .filter(ROOT_FILTER, "Hoofdfilter", Some("-999"))
        .filter(FILTER_ID, "Waterstanden", Some(ROOT_FILTER))
        .filter(DISCHARGE_FILTER_ID, "Debieten", Some(ROOT_FILTER))
        .filter(SUB_FILTER_ID, "Meetpunten Noord", Some(FILTER_ID))
        .filter("overig", "Overig", None)
        .parameter(PARAMETER_ID, PARAMETER_NAME, Some("m NAP"))
        .parameter(DISCHARGE_ID, "Discharge", Some("m3/s"))
        .entry(FILTER_ID, PARAMETER_ID, LOCATION_A, "Noordzee 4", coords::LOCATION_A.0, coords::LOCATION_A.1)
        .entry(FILTER_ID, PARAMETER_ID, LOCATION_B, "Rijndijk 1", coords::LOCATION_B.0, coords::LOCATION_B.1)
        .entry(FILTER_ID, DISCHARGE_ID, LOCATION_B, "Rijndijk 1", coords::LOCATION_B.0, coords::LOCATION_B.1)
        .entry(DISCHARGE_FILTER_ID, DISCHARGE_ID, LOCATION_B, "Rijndijk 1", coords::LOCATION_B.0, coords::LOCATION_B.1)
        .entry(SUB_FILTER_ID, PARAMETER_ID, LOCATION_A, "Noordzee 4", coords::LOCATION_A.0, coords::LOCATION_A.1);

    for (i, time) in hourly_times(start(), 24).into_iter().enumerate() {
        let value = if i == MISSING_HOUR { -999.0 } else { 1.0 + i as f64 * 0.1 };
        dataset = dataset.value(FILTER_ID, LOCATION_A, PARAMETER_ID, time, Some(value));

        // Station B reports every other hour.
        if i % 2 == 0 {
            dataset = dataset.value(FILTER_ID, LOCATION_B, PARAMETER_ID, time, Some(-0.5 + i as f64 * 0.05));
        }
        dataset = dataset.value(FILTER_ID, LOCATION_B, DISCHARGE_ID, time, Some(120.0));
    }

    dataset
}

pub fn memory_executor() -> Arc<MemoryExecutor> {
    Arc::new(MemoryExecutor::new(fews_dataset()))
}

pub fn memory_descriptor() -> SourceDescriptor {
    SourceDescriptor::new(SOURCE_SLUG, "FEWS test source", BackendKind::Memory)
}

/// A source over the fixture dataset, plus the executor for call counting
/// and failure injection.
pub fn memory_source() -> (SourceModel, Arc<MemoryExecutor>) {
    memory_source_with(memory_descriptor())
}

pub fn memory_source_with(descriptor: SourceDescriptor) -> (SourceModel, Arc<MemoryExecutor>) {
    let executor = memory_executor();
    (SourceModel::new(descriptor, executor.clone()), executor)
}

/// The window covering all fixture values.
pub fn data_range() -> DateRange {
    DateRange::new(
        parse_datetime(DATA_START).expect("fixture date is valid"),
        parse_datetime(DATA_END).expect("fixture date is valid"),
    )
}

pub fn waterlevel() -> Parameter {
    Parameter {
        id: PARAMETER_ID.to_string(),
        name: PARAMETER_NAME.to_string(),
        unit: Some("m NAP".to_string()),
        filter_id: FILTER_ID.to_string(),
    }
}

pub fn location_a() -> Location {
    Location {
        id: LOCATION_A.to_string(),
        name: "Noordzee 4".to_string(),
        longitude: coords::LOCATION_A.0,
        latitude: coords::LOCATION_A.1,
        filter_ids: vec![FILTER_ID.to_string()],
    }
}

pub fn location_b() -> Location {
    Location {
        id: LOCATION_B.to_string(),
        name: "Rijndijk 1".to_string(),
        longitude: coords::LOCATION_B.0,
        latitude: coords::LOCATION_B.1,
        filter_ids: vec![FILTER_ID.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_shape() {
        let dataset = fews_dataset();
        assert_eq!(dataset.filters.len(), 5);
        // 24 hourly values for A, 12 for B, 24 discharge values for B
        assert_eq!(dataset.values.len(), 24 + 12 + 24);
    }

    #[test]
    fn test_data_range_covers_one_day() {
        let range = data_range();
        assert_eq!((range.end - range.start).num_hours(), 23);
    }
}
