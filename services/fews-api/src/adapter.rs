//! Map-layer adapter over one FEWS source.
//!
//! Composes catalogue lookups, date resolution, series fetching and output
//! rendering into the operations a map client calls: extent, image, values
//! and search.

use serde::Serialize;
use tracing::debug;

use fews_common::{BoundingBox, DateRange, FewsError, FewsResult, Location, ValueSeries};
use jdbc_source::{SeriesRequest, SourceModel, ValueSeriesFetcher};
use renderer::{ImageSize, OutputFormat, OutputPayload, OutputRenderer};

/// Selection of series within a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub filter: String,
    pub parameter: String,
    /// Empty means every location of the parameter.
    pub locations: Vec<String>,
    pub range: DateRange,
    pub ignore_cache: bool,
}

/// A location found by [`Adapter::search`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Distance in degrees.
    pub distance: f64,
}

pub struct Adapter<'a> {
    source: &'a SourceModel,
    fetcher: &'a ValueSeriesFetcher,
    renderer: &'a OutputRenderer,
}

impl<'a> Adapter<'a> {
    pub fn new(
        source: &'a SourceModel,
        fetcher: &'a ValueSeriesFetcher,
        renderer: &'a OutputRenderer,
    ) -> Self {
        Self {
            source,
            fetcher,
            renderer,
        }
    }

    /// Locations under the filter, optionally narrowed to `location_ids`.
    /// Fails with `NoLocations` when nothing is left.
    pub async fn locations(
        &self,
        filter_id: &str,
        parameter_id: Option<&str>,
        location_ids: &[String],
    ) -> FewsResult<Vec<Location>> {
        let locations = if location_ids.is_empty() {
            self.source.get_locations(filter_id, parameter_id).await?
        } else {
            let found = self
                .source
                .find_locations(filter_id, parameter_id, location_ids)
                .await?;
            if found.len() < location_ids.len() {
                let unknown: Vec<&String> = location_ids
                    .iter()
                    .filter(|id| !found.iter().any(|l| &&l.id == id))
                    .collect();
                debug!(source = self.source.slug(), ?unknown, "Dropping unknown locations");
            }
            found
        };

        if locations.is_empty() {
            return Err(FewsError::NoLocations(match parameter_id {
                Some(parameter) => format!("filter '{}', parameter '{}'", filter_id, parameter),
                None => format!("filter '{}'", filter_id),
            }));
        }
        Ok(locations)
    }

    /// Envelope of the selected locations. A single location gets a small
    /// non-zero box.
    pub async fn extent(
        &self,
        filter_id: &str,
        parameter_id: Option<&str>,
        location_ids: &[String],
    ) -> FewsResult<BoundingBox> {
        let locations = self.locations(filter_id, parameter_id, location_ids).await?;
        BoundingBox::from_points(locations.iter().map(Location::coordinate)).ok_or_else(|| {
            FewsError::NoLocations(format!("no usable coordinates under filter '{}'", filter_id))
        })
    }

    /// One series per selected location, in request order.
    pub async fn series(&self, query: &SeriesQuery) -> FewsResult<Vec<ValueSeries>> {
        let parameter = self
            .source
            .get_parameter(&query.filter, &query.parameter)
            .await?;
        let locations = self
            .locations(&query.filter, Some(&query.parameter), &query.locations)
            .await?;

        self.fetcher
            .fetch(
                self.source,
                &SeriesRequest {
                    filter_id: &query.filter,
                    parameter: &parameter,
                    locations: &locations,
                    range: query.range,
                    ignore_cache: query.ignore_cache,
                },
            )
            .await
    }

    /// PNG graph of the selected series.
    pub async fn image(&self, query: &SeriesQuery, size: ImageSize) -> FewsResult<OutputPayload> {
        self.values(query, OutputFormat::Png, size).await
    }

    /// The selected series as CSV, HTML or PNG.
    pub async fn values(
        &self,
        query: &SeriesQuery,
        format: OutputFormat,
        size: ImageSize,
    ) -> FewsResult<OutputPayload> {
        let series = self.series(query).await?;
        self.renderer.render(format, &series, size)
    }

    /// Locations within `radius` degrees of `(x, y)`, nearest first.
    pub async fn search(
        &self,
        filter_id: &str,
        parameter_id: Option<&str>,
        x: f64,
        y: f64,
        radius: f64,
    ) -> FewsResult<Vec<SearchHit>> {
        if !x.is_finite() || !y.is_finite() {
            return Err(FewsError::invalid_parameter("x", "coordinates must be finite"));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(FewsError::invalid_parameter(
                "radius",
                "must be a positive number of degrees",
            ));
        }

        let radius_sq = radius * radius;
        let mut hits: Vec<SearchHit> = self
            .source
            .get_locations(filter_id, parameter_id)
            .await?
            .into_iter()
            .filter_map(|l| {
                let distance_sq = l.distance_sq(x, y);
                (distance_sq <= radius_sq).then(|| SearchHit {
                    distance: distance_sq.sqrt(),
                    id: l.id,
                    name: l.name,
                    longitude: l.longitude,
                    latitude: l.latitude,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fews_common::time::parse_datetime;
    use jdbc_source::{BackendKind, MemoryDataset, MemoryExecutor, SourceDescriptor};
    use std::sync::Arc;

    fn source() -> SourceModel {
        let dataset = MemoryDataset::new()
            .filter("F", "Filter", None)
            .parameter("P", "Param", None)
            .entry("F", "P", "near", "Near", 5.0, 52.0)
            .entry("F", "P", "mid", "Mid", 5.3, 52.0)
            .entry("F", "P", "far", "Far", 7.0, 53.0);
        SourceModel::new(
            SourceDescriptor::new("s", "S", BackendKind::Memory),
            Arc::new(MemoryExecutor::new(dataset)),
        )
    }

    #[tokio::test]
    async fn test_search_nearest_first() {
        let source = source();
        let fetcher = ValueSeriesFetcher::without_cache();
        let renderer = OutputRenderer::default();
        let adapter = Adapter::new(&source, &fetcher, &renderer);

        let hits = adapter.search("F", Some("P"), 5.35, 52.0, 0.5).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "near"]);
        assert!(hits[0].distance < hits[1].distance);

        assert!(adapter.search("F", None, 5.0, 52.0, 0.0).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_locations_are_dropped() {
        let source = source();
        let fetcher = ValueSeriesFetcher::without_cache();
        let renderer = OutputRenderer::default();
        let adapter = Adapter::new(&source, &fetcher, &renderer);

        let ids = vec!["far".to_string(), "nope".to_string()];
        let locations = adapter.locations("F", Some("P"), &ids).await.unwrap();
        assert_eq!(locations.len(), 1);

        let err = adapter
            .locations("F", Some("P"), &["nope".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NoLocationsError");
    }

    #[tokio::test]
    async fn test_series_for_empty_range() {
        let source = source();
        let fetcher = ValueSeriesFetcher::without_cache();
        let renderer = OutputRenderer::default();
        let adapter = Adapter::new(&source, &fetcher, &renderer);

        let query = SeriesQuery {
            filter: "F".to_string(),
            parameter: "P".to_string(),
            locations: vec![],
            range: DateRange::new(
                parse_datetime("2011-02-01").unwrap(),
                parse_datetime("2011-01-01").unwrap(),
            ),
            ignore_cache: false,
        };
        let series = adapter.series(&query).await.unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(ValueSeries::is_empty));
    }
}
