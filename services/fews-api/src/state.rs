//! Application state for the FEWS API.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use fews_common::{FewsError, FewsResult};
use jdbc_source::{
    MemorySeriesCache, RedisSeriesCache, SeriesCache, SourceModel, ValueSeriesFetcher,
};
use renderer::{load_optional_font, OutputRenderer};

use crate::adapter::Adapter;
use crate::config::{CacheBackend, ServiceConfig};

/// Configured sources, built once at startup.
pub struct SourceRegistry {
    sources: Vec<Arc<SourceModel>>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceModel>) -> Self {
        Self {
            sources: sources.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn get(&self, slug: &str) -> FewsResult<Arc<SourceModel>> {
        self.sources
            .iter()
            .find(|s| s.slug() == slug)
            .cloned()
            .ok_or_else(|| FewsError::SourceNotFound(slug.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SourceModel>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Result of clearing every cache.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheClearReport {
    pub series_entries_removed: u64,
    pub query_entries_removed: u64,
}

/// Shared application state.
pub struct AppState {
    pub sources: SourceRegistry,
    pub fetcher: ValueSeriesFetcher,
    pub renderer: OutputRenderer,
    /// Base URL for building links.
    pub base_url: String,
}

impl AppState {
    pub fn new(
        sources: Vec<SourceModel>,
        cache: Option<Arc<dyn SeriesCache>>,
        renderer: OutputRenderer,
        base_url: impl Into<String>,
    ) -> Self {
        let fetcher = match cache {
            Some(cache) => ValueSeriesFetcher::new(cache),
            None => ValueSeriesFetcher::without_cache(),
        };
        Self {
            sources: SourceRegistry::new(sources),
            fetcher,
            renderer,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build sources, caches and the renderer from configuration.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let query_cache_ttl = config.query_cache_ttl();
        let mut sources = Vec::with_capacity(config.sources.len());
        for descriptor in &config.sources {
            let source = SourceModel::connect(descriptor.clone(), query_cache_ttl)
                .with_context(|| format!("Failed to set up source '{}'", descriptor.slug))?;
            tracing::info!(
                source = %descriptor.slug,
                backend = source.executor().backend_name(),
                "Source configured"
            );
            sources.push(source);
        }

        let cache_config = &config.series_cache;
        let cache: Option<Arc<dyn SeriesCache>> = match cache_config.backend {
            CacheBackend::Memory => Some(Arc::new(MemorySeriesCache::new(
                cache_config.max_entries,
                cache_config.ttl(),
            ))),
            CacheBackend::Redis => {
                let url = cache_config
                    .redis_url
                    .as_deref()
                    .context("series_cache.redis_url is not set")?;
                Some(Arc::new(RedisSeriesCache::connect(url, cache_config.ttl()).await?))
            }
            CacheBackend::None => None,
        };

        let font = load_optional_font(config.font_path.as_deref());
        let renderer = OutputRenderer::with_font(font);

        Ok(Self::new(sources, cache, renderer, config.base_url.clone()))
    }

    pub fn source(&self, slug: &str) -> FewsResult<Arc<SourceModel>> {
        self.sources.get(slug)
    }

    pub fn adapter<'a>(&'a self, source: &'a SourceModel) -> Adapter<'a> {
        Adapter::new(source, &self.fetcher, &self.renderer)
    }

    /// Empty the series cache and every source's listing cache.
    pub async fn clear_caches(&self) -> FewsResult<CacheClearReport> {
        let series_entries_removed = match self.fetcher.cache() {
            Some(cache) => cache.clear().await?,
            None => 0,
        };

        let mut query_entries_removed = 0;
        for source in self.sources.iter() {
            query_entries_removed += source.clear_query_cache().await;
        }

        tracing::info!(
            series_entries_removed,
            query_entries_removed,
            "Caches cleared"
        );
        Ok(CacheClearReport {
            series_entries_removed,
            query_entries_removed,
        })
    }
}
