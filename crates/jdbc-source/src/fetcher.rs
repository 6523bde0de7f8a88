//! Fetches value series for a set of locations, consulting the series cache.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use fews_common::{DateRange, FewsResult, Location, Parameter, ValueSeries};

use crate::series_cache::{SeriesCache, SeriesCacheKey};
use crate::source::SourceModel;

/// What to fetch.
#[derive(Debug, Clone)]
pub struct SeriesRequest<'a> {
    pub filter_id: &'a str,
    pub parameter: &'a Parameter,
    pub locations: &'a [Location],
    pub range: DateRange,
    /// Skip the cache lookup. The fresh result still refreshes the cache.
    pub ignore_cache: bool,
}

pub struct ValueSeriesFetcher {
    cache: Option<Arc<dyn SeriesCache>>,
}

impl ValueSeriesFetcher {
    pub fn new(cache: Arc<dyn SeriesCache>) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn without_cache() -> Self {
        Self { cache: None }
    }

    pub fn cache(&self) -> Option<&Arc<dyn SeriesCache>> {
        self.cache.as_ref()
    }

    /// One series per distinct location, in request order.
    ///
    /// Locations are queried one after the other and the first failure
    /// aborts the fetch. An empty range returns empty series without
    /// touching the source or the cache.
    pub async fn fetch(
        &self,
        source: &SourceModel,
        request: &SeriesRequest<'_>,
    ) -> FewsResult<Vec<ValueSeries>> {
        let mut seen = HashSet::new();
        let locations: Vec<&Location> = request
            .locations
            .iter()
            .filter(|l| seen.insert(l.id.as_str()))
            .collect();

        if request.range.is_empty() {
            debug!(source = source.slug(), "Empty date range, nothing to fetch");
            return Ok(locations
                .into_iter()
                .map(|l| {
                    ValueSeries::empty(
                        source.slug(),
                        request.parameter.clone(),
                        l.clone(),
                        request.range,
                    )
                })
                .collect());
        }

        let cache = self.cache.as_ref().filter(|_| source.cache_enabled());
        let key = SeriesCacheKey::new(
            source.slug(),
            request.filter_id,
            request.parameter.id.as_str(),
            locations.iter().map(|l| l.id.clone()),
            request.range,
        );

        if let (Some(cache), false) = (cache, request.ignore_cache) {
            match cache.get(&key).await {
                Ok(Some(cached)) => {
                    if let Some(ordered) = reorder(cached, &locations) {
                        metrics::counter!("fews_series_cache_hits_total").increment(1);
                        return Ok(ordered);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, key = %key, "Series cache read failed"),
            }
            metrics::counter!("fews_series_cache_misses_total").increment(1);
        }

        let mut series = Vec::with_capacity(locations.len());
        for location in &locations {
            let events = source
                .get_events(
                    request.filter_id,
                    &location.id,
                    &request.parameter.id,
                    &request.range,
                )
                .await?;

            series.push(ValueSeries::new(
                source.slug(),
                request.parameter.clone(),
                (*location).clone(),
                request.range,
                events,
            ));
        }

        if let Some(cache) = cache {
            if let Err(e) = cache.put(&key, &series).await {
                warn!(error = %e, key = %key, "Series cache write failed");
            }
        }

        Ok(series)
    }
}

/// Put cached series in the requested location order. `None` when the
/// cached entry does not cover every location.
fn reorder(cached: Vec<ValueSeries>, locations: &[&Location]) -> Option<Vec<ValueSeries>> {
    locations
        .iter()
        .map(|l| cached.iter().find(|s| s.location.id == l.id).cloned())
        .collect()
}
