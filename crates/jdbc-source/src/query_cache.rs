//! TTL cache for topology queries in front of a [`QueryExecutor`].
//!
//! Filter, parameter and location listings change rarely and are expensive
//! over Jdbc2Ei, so their rows are kept for a configurable TTL. Time series
//! queries always pass straight through.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use fews_common::FewsResult;

use crate::executor::{QueryDescriptor, QueryExecutor, Row};

/// Default entry capacity.
pub const DEFAULT_QUERY_CACHE_ENTRIES: usize = 1024;

struct CachedRows {
    rows: Arc<Vec<Row>>,
    inserted_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct QueryCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
}

pub struct CachedExecutor {
    inner: Arc<dyn QueryExecutor>,
    cache: Mutex<LruCache<QueryDescriptor, CachedRows>>,
    ttl: Duration,
    stats: QueryCacheStats,
}

impl CachedExecutor {
    pub fn new(inner: Arc<dyn QueryExecutor>, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_QUERY_CACHE_ENTRIES)
    }

    pub fn with_capacity(inner: Arc<dyn QueryExecutor>, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
            stats: QueryCacheStats::default(),
        }
    }

    pub fn stats(&self) -> &QueryCacheStats {
        &self.stats
    }


    async fn lookup(&self, query: &QueryDescriptor) -> Option<Arc<Vec<Row>>> {
        let mut cache = self.cache.lock().await;
        let expired = match cache.get(query) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.rows));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            cache.pop(query);
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[async_trait]
impl QueryExecutor for CachedExecutor {
    async fn execute(&self, query: &QueryDescriptor) -> FewsResult<Vec<Row>> {
        if !query.is_topology() {
            return self.inner.execute(query).await;
        }

        if let Some(rows) = self.lookup(query).await {
            return Ok(rows.as_ref().clone());
        }

        // Only successful results are cached; errors stay visible to callers.
        let rows = self.inner.execute(query).await?;
        self.cache.lock().await.put(
            query.clone(),
            CachedRows {
                rows: Arc::new(rows.clone()),
                inserted_at: Instant::now(),
            },
        );
        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn clear_cache(&self) -> u64 {
        let removed = {
            let mut cache = self.cache.lock().await;
            let removed = cache.len() as u64;
            cache.clear();
            removed
        };
        removed + self.inner.clear_cache().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryKind;
    use crate::memory::{MemoryDataset, MemoryExecutor};
    use fews_common::time::parse_datetime;

    fn memory() -> Arc<MemoryExecutor> {
        Arc::new(MemoryExecutor::new(
            MemoryDataset::new().filter("F1", "Filter", None),
        ))
    }

    #[tokio::test]
    async fn test_topology_is_cached() {
        let memory = memory();
        let cached = CachedExecutor::new(memory.clone(), Duration::from_secs(60));

        cached.execute(&QueryDescriptor::Filters).await.unwrap();
        cached.execute(&QueryDescriptor::Filters).await.unwrap();

        assert_eq!(memory.calls(QueryKind::Filters), 1);
        assert_eq!(cached.stats().hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_timeseries_is_never_cached() {
        let memory = memory();
        let cached = CachedExecutor::new(memory.clone(), Duration::from_secs(60));
        let query = QueryDescriptor::TimeSeries {
            filter_id: "F1".to_string(),
            location_id: "L".to_string(),
            parameter_id: "P".to_string(),
            start: parse_datetime("2011-01-01").unwrap(),
            end: parse_datetime("2011-01-02").unwrap(),
        };

        cached.execute(&query).await.unwrap();
        cached.execute(&query).await.unwrap();
        assert_eq!(memory.calls(QueryKind::TimeSeries), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let memory = memory();
        let cached = CachedExecutor::new(memory.clone(), Duration::ZERO);

        cached.execute(&QueryDescriptor::Filters).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cached.execute(&QueryDescriptor::Filters).await.unwrap();

        assert_eq!(memory.calls(QueryKind::Filters), 2);
        assert_eq!(cached.stats().expired.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let memory = memory();
        let cached = CachedExecutor::new(memory.clone(), Duration::from_secs(60));

        memory.set_failing(true);
        assert!(cached.execute(&QueryDescriptor::Filters).await.is_err());
        memory.set_failing(false);
        assert!(cached.execute(&QueryDescriptor::Filters).await.is_ok());
        assert_eq!(memory.calls(QueryKind::Filters), 2);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let memory = memory();
        let cached = CachedExecutor::new(memory.clone(), Duration::from_secs(60));

        cached.execute(&QueryDescriptor::Filters).await.unwrap();
        assert_eq!(cached.clear_cache().await, 1);
        cached.execute(&QueryDescriptor::Filters).await.unwrap();

        assert_eq!(memory.calls(QueryKind::Filters), 2);
    }
}
