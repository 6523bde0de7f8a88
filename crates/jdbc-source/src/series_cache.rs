//! Cache for fetched value series.
//!
//! Entries are keyed by source, filter, parameter, the set of locations and
//! the date range. The in-memory implementation splits its LRU across
//! shards so concurrent requests for different keys do not contend on one
//! lock.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use serde::Serialize;
use tokio::sync::Mutex;

use fews_common::{DateRange, FewsResult, ValueSeries};

/// Default time-to-live, matching the usual FEWS import cycle.
pub const DEFAULT_SERIES_TTL: Duration = Duration::from_secs(8 * 3600);

/// Default total entry capacity.
pub const DEFAULT_SERIES_ENTRIES: usize = 2048;

const SHARDS: usize = 16;

/// Identity of a cached fetch. Location ids are kept sorted so the same set
/// in a different order hits the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesCacheKey {
    pub source: String,
    pub filter_id: String,
    pub parameter_id: String,
    pub location_ids: Vec<String>,
    pub range: DateRange,
}

impl SeriesCacheKey {
    pub fn new(
        source: impl Into<String>,
        filter_id: impl Into<String>,
        parameter_id: impl Into<String>,
        location_ids: impl IntoIterator<Item = String>,
        range: DateRange,
    ) -> Self {
        let mut location_ids: Vec<String> = location_ids.into_iter().collect();
        location_ids.sort();
        location_ids.dedup();
        Self {
            source: source.into(),
            filter_id: filter_id.into(),
            parameter_id: parameter_id.into(),
            location_ids,
            range,
        }
    }
}

impl fmt::Display for SeriesCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fews:series:{}:{}:{}:{}:{}",
            self.source,
            self.filter_id,
            self.parameter_id,
            self.location_ids.join(","),
            self.range.key()
        )
    }
}

/// Storage for fetched series.
#[async_trait]
pub trait SeriesCache: Send + Sync {
    async fn get(&self, key: &SeriesCacheKey) -> FewsResult<Option<Vec<ValueSeries>>>;

    async fn put(&self, key: &SeriesCacheKey, series: &[ValueSeries]) -> FewsResult<()>;

    async fn invalidate(&self, key: &SeriesCacheKey) -> FewsResult<()>;

    /// Drop every entry. Returns the number removed when known.
    async fn clear(&self) -> FewsResult<u64>;

    fn stats(&self) -> CacheStatsSnapshot;
}

/// Counters shared by cache implementations.
#[derive(Debug, Default)]
pub struct SeriesCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
    pub entries: AtomicU64,
}

impl SeriesCacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Point-in-time view of [`SeriesCacheStats`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub entries: u64,
    pub hit_rate: f64,
}

struct CachedSeries {
    series: Arc<Vec<ValueSeries>>,
    inserted_at: Instant,
}

/// Sharded in-memory LRU with a TTL checked on read.
pub struct MemorySeriesCache {
    shards: Vec<Mutex<LruCache<SeriesCacheKey, CachedSeries>>>,
    ttl: Duration,
    stats: SeriesCacheStats,
}

impl MemorySeriesCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let per_shard = NonZeroUsize::new((max_entries / SHARDS).max(1)).unwrap_or(NonZeroUsize::MIN);

        tracing::info!(
            max_entries,
            shards = SHARDS,
            ttl_secs = ttl.as_secs(),
            "MemorySeriesCache initialized"
        );

        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(LruCache::new(per_shard))).collect(),
            ttl,
            stats: SeriesCacheStats::default(),
        }
    }

    fn shard(&self, key: &SeriesCacheKey) -> &Mutex<LruCache<SeriesCacheKey, CachedSeries>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }
}

impl Default for MemorySeriesCache {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_ENTRIES, DEFAULT_SERIES_TTL)
    }
}

#[async_trait]
impl SeriesCache for MemorySeriesCache {
    async fn get(&self, key: &SeriesCacheKey) -> FewsResult<Option<Vec<ValueSeries>>> {
        let mut shard = self.shard(key).lock().await;

        let expired = match shard.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.series.as_ref().clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired && shard.pop(key).is_some() {
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            self.stats.entries.fetch_sub(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn put(&self, key: &SeriesCacheKey, series: &[ValueSeries]) -> FewsResult<()> {
        let mut shard = self.shard(key).lock().await;
        let entry = CachedSeries {
            series: Arc::new(series.to_vec()),
            inserted_at: Instant::now(),
        };

        // `push` returns the replaced or evicted entry; either way the count holds.
        if shard.push(key.clone(), entry).is_none() {
            self.stats.entries.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn invalidate(&self, key: &SeriesCacheKey) -> FewsResult<()> {
        if self.shard(key).lock().await.pop(key).is_some() {
            self.stats.entries.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn clear(&self) -> FewsResult<u64> {
        let mut removed = 0u64;
        for shard in &self.shards {
            let mut shard = shard.lock().await;
            removed += shard.len() as u64;
            shard.clear();
        }
        self.stats.entries.store(0, Ordering::Relaxed);
        Ok(removed)
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fews_common::time::parse_datetime;
    use fews_common::{Location, Parameter};

    fn range() -> DateRange {
        DateRange::new(
            parse_datetime("2011-01-01").unwrap(),
            parse_datetime("2011-02-01").unwrap(),
        )
    }

    fn key(locations: &[&str]) -> SeriesCacheKey {
        SeriesCacheKey::new(
            "fews",
            "F1",
            "H.meting",
            locations.iter().map(|s| s.to_string()),
            range(),
        )
    }

    fn series(location: &str) -> ValueSeries {
        ValueSeries::empty(
            "fews",
            Parameter {
                id: "H.meting".to_string(),
                name: "Waterlevel".to_string(),
                unit: None,
                filter_id: "F1".to_string(),
            },
            Location {
                id: location.to_string(),
                name: location.to_string(),
                longitude: 5.0,
                latitude: 52.0,
                filter_ids: vec!["F1".to_string()],
            },
            range(),
        )
    }

    #[test]
    fn test_key_ignores_location_order() {
        assert_eq!(key(&["b", "a"]), key(&["a", "b"]));
        assert_eq!(key(&["a", "a"]).location_ids, vec!["a".to_string()]);
        assert!(key(&["a"]).to_string().starts_with("fews:series:fews:F1:H.meting:a:"));
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = MemorySeriesCache::default();
        let k = key(&["L1"]);

        assert!(cache.get(&k).await.unwrap().is_none());
        cache.put(&k, &[series("L1")]).await.unwrap();

        let hit = cache.get(&k).await.unwrap().unwrap();
        assert_eq!(hit[0].location.id, "L1");

        cache.invalidate(&k).await.unwrap();
        assert!(cache.get(&k).await.unwrap().is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemorySeriesCache::new(16, Duration::ZERO);
        let k = key(&["L1"]);
        cache.put(&k, &[series("L1")]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(cache.get(&k).await.unwrap().is_none());
        assert_eq!(cache.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_clear_counts_entries() {
        let cache = MemorySeriesCache::default();
        cache.put(&key(&["a"]), &[series("a")]).await.unwrap();
        cache.put(&key(&["b"]), &[series("b")]).await.unwrap();
        cache.put(&key(&["b"]), &[series("b")]).await.unwrap();

        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.stats().entries, 0);
    }
}
