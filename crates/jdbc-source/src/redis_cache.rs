//! Redis-backed series cache, shared between service instances.

use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

use fews_common::{FewsError, FewsResult, ValueSeries};

use crate::series_cache::{CacheStatsSnapshot, SeriesCache, SeriesCacheKey, SeriesCacheStats};

const KEY_PATTERN: &str = "fews:series:*";

pub struct RedisSeriesCache {
    conn: MultiplexedConnection,
    ttl: Duration,
    stats: SeriesCacheStats,
}

impl RedisSeriesCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str, ttl: Duration) -> FewsResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| FewsError::Cache(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FewsError::Cache(format!("Redis connection failed: {}", e)))?;

        tracing::info!(ttl_secs = ttl.as_secs(), "Connected series cache to Redis");

        Ok(Self {
            conn,
            ttl,
            stats: SeriesCacheStats::default(),
        })
    }
}

#[async_trait]
impl SeriesCache for RedisSeriesCache {
    async fn get(&self, key: &SeriesCacheKey) -> FewsResult<Option<Vec<ValueSeries>>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn
            .get(key.to_string())
            .await
            .map_err(|e| FewsError::Cache(format!("Cache get failed: {}", e)))?;

        match data {
            Some(json) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &SeriesCacheKey, series: &[ValueSeries]) -> FewsResult<()> {
        let json = serde_json::to_string(series)?;
        let mut conn = self.conn.clone();

        let _: () = conn
            .set_ex(key.to_string(), json, self.ttl.as_secs().max(1))
            .await
            .map_err(|e| FewsError::Cache(format!("Cache set failed: {}", e)))?;

        Ok(())
    }

    async fn invalidate(&self, key: &SeriesCacheKey) -> FewsResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(key.to_string())
            .await
            .map_err(|e| FewsError::Cache(format!("Cache delete failed: {}", e)))?;
        Ok(())
    }

    async fn clear(&self) -> FewsResult<u64> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(KEY_PATTERN)
            .query_async(&mut conn)
            .await
            .map_err(|e| FewsError::Cache(format!("Pattern search failed: {}", e)))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len() as u64;
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| FewsError::Cache(format!("Delete failed: {}", e)))?;

        Ok(count)
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
