//! Tests for value series fetching against the fixture source.

use std::sync::Arc;

use fews_common::time::parse_datetime;
use fews_common::{DateRange, FewsError};
use jdbc_source::{
    MemorySeriesCache, QueryKind, SeriesCache, SeriesRequest, ValueSeriesFetcher,
};
use test_utils::{
    data_range, location_a, location_b, memory_descriptor, memory_source, memory_source_with,
    waterlevel, FILTER_ID, LOCATION_A, LOCATION_B, MISSING_HOUR,
};

fn fetcher() -> (ValueSeriesFetcher, Arc<MemorySeriesCache>) {
    let cache = Arc::new(MemorySeriesCache::default());
    (ValueSeriesFetcher::new(cache.clone()), cache)
}

// ============================================================================
// Basic fetching
// ============================================================================

#[tokio::test]
async fn test_series_per_location_in_request_order() {
    let (source, _) = memory_source();
    let (fetcher, _) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_b(), location_a()];

    let series = fetcher
        .fetch(
            &source,
            &SeriesRequest {
                filter_id: FILTER_ID,
                parameter: &parameter,
                locations: &locations,
                range: data_range(),
                ignore_cache: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].location.id, LOCATION_B);
    assert_eq!(series[1].location.id, LOCATION_A);
    assert_eq!(series[0].len(), 12);
    assert_eq!(series[1].len(), 24);
    assert_eq!(series[1].events()[MISSING_HOUR].value, None);
}

#[tokio::test]
async fn test_duplicate_locations_are_fetched_once() {
    let (source, executor) = memory_source();
    let (fetcher, _) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a(), location_a(), location_b()];

    let series = fetcher
        .fetch(
            &source,
            &SeriesRequest {
                filter_id: FILTER_ID,
                parameter: &parameter,
                locations: &locations,
                range: data_range(),
                ignore_cache: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(executor.calls(QueryKind::TimeSeries), 2);
}

#[tokio::test]
async fn test_timestamps_strictly_increasing() {
    let (source, _) = memory_source();
    let (fetcher, _) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a()];

    let series = fetcher
        .fetch(
            &source,
            &SeriesRequest {
                filter_id: FILTER_ID,
                parameter: &parameter,
                locations: &locations,
                range: data_range(),
                ignore_cache: false,
            },
        )
        .await
        .unwrap();

    assert!(series[0]
        .events()
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));
}

// ============================================================================
// Empty ranges
// ============================================================================

#[tokio::test]
async fn test_reversed_range_yields_empty_series_without_queries() {
    let (source, executor) = memory_source();
    let (fetcher, cache) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a(), location_b()];
    let range = DateRange::new(
        parse_datetime("2011-02-01").unwrap(),
        parse_datetime("2011-01-01").unwrap(),
    );

    let series = fetcher
        .fetch(
            &source,
            &SeriesRequest {
                filter_id: FILTER_ID,
                parameter: &parameter,
                locations: &locations,
                range,
                ignore_cache: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert!(series.iter().all(|s| s.is_empty()));
    assert_eq!(executor.total_calls(), 0);
    assert_eq!(cache.stats().misses, 0);
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn test_cache_hit_skips_executor() {
    let (source, executor) = memory_source();
    let (fetcher, _) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a(), location_b()];
    let request = SeriesRequest {
        filter_id: FILTER_ID,
        parameter: &parameter,
        locations: &locations,
        range: data_range(),
        ignore_cache: false,
    };

    let first = fetcher.fetch(&source, &request).await.unwrap();
    let second = fetcher.fetch(&source, &request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(executor.calls(QueryKind::TimeSeries), 2);
}

#[tokio::test]
async fn test_cache_hit_in_different_order() {
    let (source, executor) = memory_source();
    let (fetcher, _) = fetcher();
    let parameter = waterlevel();
    let forward = vec![location_a(), location_b()];
    let backward = vec![location_b(), location_a()];

    let mut request = SeriesRequest {
        filter_id: FILTER_ID,
        parameter: &parameter,
        locations: &forward,
        range: data_range(),
        ignore_cache: false,
    };

    fetcher.fetch(&source, &request).await.unwrap();
    request.locations = &backward;
    let series = fetcher.fetch(&source, &request).await.unwrap();

    assert_eq!(series[0].location.id, LOCATION_B);
    assert_eq!(executor.calls(QueryKind::TimeSeries), 2);
}

#[tokio::test]
async fn test_ignore_cache_forces_refetch() {
    let (source, executor) = memory_source();
    let (fetcher, _) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a()];
    let mut request = SeriesRequest {
        filter_id: FILTER_ID,
        parameter: &parameter,
        locations: &locations,
        range: data_range(),
        ignore_cache: false,
    };

    fetcher.fetch(&source, &request).await.unwrap();
    request.ignore_cache = true;
    fetcher.fetch(&source, &request).await.unwrap();

    assert_eq!(executor.calls(QueryKind::TimeSeries), 2);
}

#[tokio::test]
async fn test_cache_disabled_per_source() {
    let mut descriptor = memory_descriptor();
    descriptor.cache_enabled = false;
    let (source, executor) = memory_source_with(descriptor);
    let (fetcher, cache) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a()];
    let request = SeriesRequest {
        filter_id: FILTER_ID,
        parameter: &parameter,
        locations: &locations,
        range: data_range(),
        ignore_cache: false,
    };

    fetcher.fetch(&source, &request).await.unwrap();
    fetcher.fetch(&source, &request).await.unwrap();

    assert_eq!(executor.calls(QueryKind::TimeSeries), 2);
    assert_eq!(cache.stats().entries, 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failure_aborts_fetch_and_is_not_cached() {
    let (source, executor) = memory_source();
    let (fetcher, cache) = fetcher();
    let parameter = waterlevel();
    let locations = vec![location_a(), location_b()];
    let request = SeriesRequest {
        filter_id: FILTER_ID,
        parameter: &parameter,
        locations: &locations,
        range: data_range(),
        ignore_cache: false,
    };

    executor.set_failing(true);
    let err = fetcher.fetch(&source, &request).await.unwrap_err();
    assert!(matches!(err, FewsError::DataSource { .. }));
    // The first location failed, the second was never queried.
    assert_eq!(executor.calls(QueryKind::TimeSeries), 1);
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn test_fetch_without_cache() {
    let (source, executor) = memory_source();
    let fetcher = ValueSeriesFetcher::without_cache();
    let parameter = waterlevel();
    let locations = vec![location_a()];
    let request = SeriesRequest {
        filter_id: FILTER_ID,
        parameter: &parameter,
        locations: &locations,
        range: data_range(),
        ignore_cache: false,
    };

    fetcher.fetch(&source, &request).await.unwrap();
    fetcher.fetch(&source, &request).await.unwrap();
    assert_eq!(executor.calls(QueryKind::TimeSeries), 2);
}
