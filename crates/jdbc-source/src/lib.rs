//! Access to FEWS JDBC sources.
//!
//! This crate provides:
//! - [`QueryExecutor`] backends: Jdbc2Ei over XML-RPC, PostgreSQL and in-memory
//! - A TTL cache for topology queries ([`CachedExecutor`])
//! - The filter hierarchy ([`FilterTree`])
//! - Catalogue queries on a configured source ([`SourceModel`])
//! - Value series fetching with a pluggable [`SeriesCache`]

pub mod executor;
pub mod fetcher;
pub mod filter_tree;
pub mod jdbc2ei;
pub mod memory;
pub mod query_cache;
pub mod redis_cache;
pub mod series_cache;
pub mod source;
pub mod sql;
pub mod xmlrpc;

pub use executor::{QueryDescriptor, QueryExecutor, QueryKind, Row, Value};
pub use fetcher::{SeriesRequest, ValueSeriesFetcher};
pub use filter_tree::{FilterTree, FilterTreeItem};
pub use jdbc2ei::Jdbc2EiExecutor;
pub use memory::{MemoryDataset, MemoryExecutor};
pub use query_cache::CachedExecutor;
pub use redis_cache::RedisSeriesCache;
pub use series_cache::{MemorySeriesCache, SeriesCache, SeriesCacheKey};
pub use source::{BackendKind, FilterSelection, SourceDescriptor, SourceModel};
pub use sql::SqlExecutor;
