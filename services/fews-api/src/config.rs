//! Service configuration loading and types.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use jdbc_source::series_cache::{DEFAULT_SERIES_ENTRIES, DEFAULT_SERIES_TTL};
use jdbc_source::SourceDescriptor;

/// Where fetched series are cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
    /// No series caching at all.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeriesCacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Required for the redis backend.
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_series_ttl_secs")]
    pub ttl_secs: u64,

    /// Capacity of the in-memory cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl SeriesCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SeriesCacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            ttl_secs: default_series_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_series_ttl_secs() -> u64 {
    DEFAULT_SERIES_TTL.as_secs()
}

fn default_max_entries() -> usize {
    DEFAULT_SERIES_ENTRIES
}

fn default_query_cache_ttl_secs() -> u64 {
    8 * 3600
}

fn default_base_url() -> String {
    "http://localhost:8085".to_string()
}

/// Top-level service configuration, usually read from `config/fews.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Public base URL used when building links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TrueType font for graph labels. Graphs are unlabeled without one.
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    #[serde(default)]
    pub series_cache: SeriesCacheConfig,

    /// TTL of cached filter/parameter/location listings; 0 disables.
    #[serde(default = "default_query_cache_ttl_secs")]
    pub query_cache_ttl_secs: u64,

    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl ServiceConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config: {:?}", path))?;

        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded service configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut slugs = HashSet::new();
        for source in &self.sources {
            if !slugs.insert(source.slug.as_str()) {
                bail!("Duplicate source slug '{}'", source.slug);
            }
            source
                .validate()
                .with_context(|| format!("Source '{}'", source.slug))?;
        }

        if self.series_cache.backend == CacheBackend::Redis && self.series_cache.redis_url.is_none()
        {
            bail!("series_cache.redis_url is required for the redis backend");
        }

        if self.sources.is_empty() {
            tracing::warn!("No sources configured");
        }
        Ok(())
    }

    pub fn query_cache_ttl(&self) -> Option<Duration> {
        (self.query_cache_ttl_secs > 0).then(|| Duration::from_secs(self.query_cache_ttl_secs))
    }
}
