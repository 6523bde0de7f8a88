//! A configured FEWS JDBC source and the catalogue queries on it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use fews_common::time::DEFAULT_PERIOD_DAYS;
use fews_common::{
    DateRange, DateRangeResolver, Event, FewsError, FewsResult, FilterNode, Location, Parameter,
};

use crate::executor::{cell, QueryDescriptor, QueryExecutor, Row};
use crate::filter_tree::FilterTree;
use crate::jdbc2ei::Jdbc2EiExecutor;
use crate::memory::{MemoryDataset, MemoryExecutor};
use crate::query_cache::CachedExecutor;
use crate::sql::SqlExecutor;

/// Transport used to reach the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Jdbc2ei,
    Postgres,
    Memory,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_period_days() -> i64 {
    DEFAULT_PERIOD_DAYS
}

/// Configuration of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// URL-safe identifier.
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub backend: BackendKind,
    /// Jdbc2Ei endpoint or database URL.
    #[serde(default)]
    pub jdbc_url: String,
    #[serde(default)]
    pub jdbc_tag_name: String,
    #[serde(default)]
    pub connector_string: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Enables `filter_tree_root` and `customfilter`.
    #[serde(default)]
    pub usecustomfilter: bool,
    #[serde(default)]
    pub filter_tree_root: Option<String>,
    /// Replaces the source's own filter list when non-empty.
    #[serde(default)]
    pub customfilter: Vec<FilterNode>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_period_days")]
    pub default_period_days: i64,
    /// Dataset file for the memory backend.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
}

impl SourceDescriptor {
    pub fn new(slug: impl Into<String>, name: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            backend,
            jdbc_url: String::new(),
            jdbc_tag_name: String::new(),
            connector_string: String::new(),
            timeout_secs: default_timeout_secs(),
            usecustomfilter: false,
            filter_tree_root: None,
            customfilter: Vec::new(),
            cache_enabled: true,
            default_period_days: DEFAULT_PERIOD_DAYS,
            dataset: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the settings needed by the chosen backend.
    pub fn validate(&self) -> FewsResult<()> {
        if self.slug.trim().is_empty() {
            return Err(FewsError::Config("source slug must not be empty".to_string()));
        }
        if self.default_period_days < 0 {
            return Err(FewsError::Config(format!(
                "source '{}': default_period_days must not be negative",
                self.slug
            )));
        }
        match self.backend {
            BackendKind::Jdbc2ei if self.jdbc_url.is_empty() || self.jdbc_tag_name.is_empty() => {
                Err(FewsError::Config(format!(
                    "source '{}': jdbc2ei needs jdbc_url and jdbc_tag_name",
                    self.slug
                )))
            }
            BackendKind::Postgres if self.jdbc_url.is_empty() => Err(FewsError::Config(format!(
                "source '{}': postgres needs jdbc_url",
                self.slug
            ))),
            _ => Ok(()),
        }
    }
}

/// Per-request filter options. Unset fields fall back to the descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterSelection {
    pub usecustomfilter: Option<bool>,
    #[serde(alias = "filter_tree_root")]
    pub root_override: Option<String>,
}

/// Catalogue access to one configured source.
pub struct SourceModel {
    descriptor: SourceDescriptor,
    executor: Arc<dyn QueryExecutor>,
}

impl SourceModel {
    pub fn new(descriptor: SourceDescriptor, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            descriptor,
            executor,
        }
    }

    /// Build the executor for the descriptor's backend, wrapped in a topology
    /// cache when `query_cache_ttl` is set.
    pub fn connect(
        descriptor: SourceDescriptor,
        query_cache_ttl: Option<Duration>,
    ) -> FewsResult<Self> {
        descriptor.validate()?;

        let executor: Arc<dyn QueryExecutor> = match descriptor.backend {
            BackendKind::Jdbc2ei => Arc::new(Jdbc2EiExecutor::new(
                descriptor.jdbc_url.clone(),
                descriptor.jdbc_tag_name.clone(),
                descriptor.connector_string.clone(),
                descriptor.timeout(),
            )?),
            BackendKind::Postgres => Arc::new(SqlExecutor::connect_lazy(
                &descriptor.jdbc_url,
                descriptor.timeout(),
            )?),
            BackendKind::Memory => {
                let dataset = match &descriptor.dataset {
                    Some(path) => MemoryDataset::from_yaml_file(path)?,
                    None => MemoryDataset::new(),
                };
                Arc::new(MemoryExecutor::new(dataset))
            }
        };

        let executor = match query_cache_ttl {
            Some(ttl) if !ttl.is_zero() => {
                Arc::new(CachedExecutor::new(executor, ttl)) as Arc<dyn QueryExecutor>
            }
            _ => executor,
        };

        Ok(Self::new(descriptor, executor))
    }

    pub fn slug(&self) -> &str {
        &self.descriptor.slug
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    pub fn cache_enabled(&self) -> bool {
        self.descriptor.cache_enabled
    }

    /// Drop cached topology listings. Returns the number of entries removed.
    pub async fn clear_query_cache(&self) -> u64 {
        self.executor.clear_cache().await
    }

    /// Date resolver using this source's default window.
    pub fn date_resolver(&self) -> DateRangeResolver {
        DateRangeResolver::new(self.descriptor.default_period_days)
    }

    async fn query(&self, query: QueryDescriptor) -> FewsResult<Vec<Row>> {
        let kind = query.kind().as_str();
        let started = Instant::now();
        let result = self.executor.execute(&query).await;

        metrics::histogram!(
            "fews_query_duration_seconds",
            "source" => self.descriptor.slug.clone(),
            "query" => kind
        )
        .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(rows) => debug!(
                source = %self.descriptor.slug,
                query = kind,
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query executed"
            ),
            Err(e) => error!(source = %self.descriptor.slug, query = kind, error = %e, "Query failed"),
        }
        result
    }

    /// The filter hierarchy for a request.
    ///
    /// With custom filtering in effect, a non-empty `customfilter` list
    /// replaces the source's topology and the tree is rooted at the
    /// requested or configured `filter_tree_root`. Without it the source's
    /// full hierarchy is returned.
    pub fn get_filters(&self, selection: &FilterSelection) -> FilterTree {
        let use_custom = selection
            .usecustomfilter
            .unwrap_or(self.descriptor.usecustomfilter);

        if !use_custom {
            return FilterTree::from_executor(Arc::clone(&self.executor));
        }

        let tree = if self.descriptor.customfilter.is_empty() {
            FilterTree::from_executor(Arc::clone(&self.executor))
        } else {
            FilterTree::from_nodes(self.descriptor.customfilter.clone())
        };

        match selection
            .root_override
            .as_deref()
            .or(self.descriptor.filter_tree_root.as_deref())
        {
            Some(root) => tree.root_view(root),
            None => tree,
        }
    }

    /// Parameters available under a filter, in source order. The unit is only
    /// filled in when the listing carries one; [`SourceModel::get_parameter`]
    /// resolves it otherwise.
    pub async fn get_parameters(&self, filter_id: &str) -> FewsResult<Vec<Parameter>> {
        let rows = self
            .query(QueryDescriptor::Parameters {
                filter_id: filter_id.to_string(),
            })
            .await?;

        let mut parameters: Vec<Parameter> = Vec::new();
        for row in &rows {
            let Some(id) = cell(row, 1).to_text() else {
                continue;
            };
            if parameters.iter().any(|p| p.id == id) {
                continue;
            }
            let name = cell(row, 2).to_text().unwrap_or_else(|| id.clone());
            let unit = cell(row, 3).to_text().filter(|u| !u.trim().is_empty());
            parameters.push(Parameter {
                id,
                name,
                unit,
                filter_id: filter_id.to_string(),
            });
        }
        Ok(parameters)
    }

    /// Display name of a parameter. Fails when the source has no row for it.
    pub async fn get_parameter_name(&self, parameter_id: &str) -> FewsResult<String> {
        let query = QueryDescriptor::ParameterName {
            parameter_id: parameter_id.to_string(),
        };
        let rows = self.query(query.clone()).await?;

        let first = rows
            .first()
            .ok_or_else(|| FewsError::data_source(query.to_sql(), "no rows"))?;
        Ok(cell(first, 0)
            .to_text()
            .unwrap_or_else(|| parameter_id.to_string()))
    }

    /// Unit of a parameter; a blank unit is `None`. Fails when the source has
    /// no row for it.
    pub async fn get_unit(&self, parameter_id: &str) -> FewsResult<Option<String>> {
        let query = QueryDescriptor::Unit {
            parameter_id: parameter_id.to_string(),
        };
        let rows = self.query(query.clone()).await?;

        let first = rows
            .first()
            .ok_or_else(|| FewsError::data_source(query.to_sql(), "no rows"))?;
        Ok(cell(first, 0)
            .to_text()
            .filter(|unit| !unit.trim().is_empty()))
    }

    /// A fully described parameter within a filter. Name and unit come from
    /// the filter's listing when present, from the parameter table otherwise.
    pub async fn get_parameter(&self, filter_id: &str, parameter_id: &str) -> FewsResult<Parameter> {
        let listed = self
            .get_parameters(filter_id)
            .await?
            .into_iter()
            .find(|p| p.id == parameter_id);

        let name = match listed.as_ref().map(|p| p.name.as_str()) {
            Some(name) if name != parameter_id => name.to_string(),
            _ => self.get_parameter_name(parameter_id).await?,
        };
        let unit = match listed.and_then(|p| p.unit) {
            Some(unit) => Some(unit),
            None => self.get_unit(parameter_id).await?,
        };

        Ok(Parameter {
            id: parameter_id.to_string(),
            name,
            unit,
            filter_id: filter_id.to_string(),
        })
    }

    /// Locations under a filter, optionally restricted to those carrying a
    /// parameter. Rows without usable coordinates are skipped.
    pub async fn get_locations(
        &self,
        filter_id: &str,
        parameter_id: Option<&str>,
    ) -> FewsResult<Vec<Location>> {
        let rows = self
            .query(QueryDescriptor::Locations {
                filter_id: filter_id.to_string(),
                parameter_id: parameter_id.map(str::to_string),
            })
            .await?;

        let mut locations: Vec<Location> = Vec::new();
        for row in &rows {
            let (Some(longitude), Some(latitude), Some(id)) = (
                cell(row, 0).as_f64(),
                cell(row, 1).as_f64(),
                cell(row, 3).to_text(),
            ) else {
                warn!(source = %self.descriptor.slug, ?row, "Skipping location row without coordinates");
                continue;
            };
            if !longitude.is_finite() || !latitude.is_finite() {
                continue;
            }
            if locations.iter().any(|l| l.id == id) {
                continue;
            }
            let name = cell(row, 2).to_text().unwrap_or_else(|| id.clone());
            locations.push(Location {
                id,
                name,
                longitude,
                latitude,
                filter_ids: vec![filter_id.to_string()],
            });
        }
        Ok(locations)
    }

    /// Locations by id, in the order requested. Unknown ids are dropped.
    pub async fn find_locations(
        &self,
        filter_id: &str,
        parameter_id: Option<&str>,
        location_ids: &[String],
    ) -> FewsResult<Vec<Location>> {
        let all = self.get_locations(filter_id, parameter_id).await?;
        Ok(location_ids
            .iter()
            .filter_map(|id| all.iter().find(|l| &l.id == id).cloned())
            .collect())
    }

    /// Raw events for one location. An empty range issues no query.
    pub async fn get_events(
        &self,
        filter_id: &str,
        location_id: &str,
        parameter_id: &str,
        range: &DateRange,
    ) -> FewsResult<Vec<Event>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .query(QueryDescriptor::TimeSeries {
                filter_id: filter_id.to_string(),
                location_id: location_id.to_string(),
                parameter_id: parameter_id.to_string(),
                start: range.start,
                end: range.end,
            })
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let timestamp = cell(row, 0).as_datetime()?;
                let mut event = Event::new(timestamp, cell(row, 1).as_f64());
                event.flag = cell(row, 2).as_i64();
                event.detection = cell(row, 3).as_i64();
                event.comment = cell(row, 4).to_text().filter(|c| !c.is_empty());
                Some(event)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryKind;
    use chrono::NaiveDateTime;
    use fews_common::time::parse_datetime;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn model(descriptor: SourceDescriptor) -> (SourceModel, Arc<MemoryExecutor>) {
        let memory = Arc::new(MemoryExecutor::new(
            MemoryDataset::new()
                .filter("root", "Root", None)
                .filter("F1", "Waterstanden", Some("root"))
                .filter("F2", "Debieten", Some("root"))
                .parameter("H.meting", "Waterlevel", Some("m NAP"))
                .parameter("Q", "Discharge", Some(" "))
                .entry("F1", "H.meting", "L1", "Loc 1", 5.0, 52.0)
                .entry("F1", "Q", "L2", "Loc 2", 5.5, 52.5)
                .value("F1", "L1", "H.meting", ts("2011-01-01 00:00:00"), Some(-999.0))
                .value("F1", "L1", "H.meting", ts("2011-01-02 00:00:00"), Some(1.5)),
        ));
        (SourceModel::new(descriptor, memory.clone()), memory)
    }

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new("fews", "FEWS", BackendKind::Memory)
    }

    #[tokio::test]
    async fn test_parameter_resolution() {
        let (model, _) = model(descriptor());

        let parameters = model.get_parameters("F1").await.unwrap();
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[0].name, "Waterlevel");

        let parameter = model.get_parameter("F1", "H.meting").await.unwrap();
        assert_eq!(parameter.unit.as_deref(), Some("m NAP"));

        // Blank units read as none, unknown parameters are a data source error.
        assert_eq!(model.get_unit("Q").await.unwrap(), None);
        let err = model.get_parameter_name("X").await.unwrap_err();
        assert!(matches!(err, FewsError::DataSource { ref cause, .. } if cause == "no rows"));
    }

    #[tokio::test]
    async fn test_locations_filtered_by_parameter() {
        let (model, _) = model(descriptor());

        assert_eq!(model.get_locations("F1", None).await.unwrap().len(), 2);
        let locations = model.get_locations("F1", Some("Q")).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].id, "L2");
        assert_eq!(locations[0].coordinate(), (5.5, 52.5));
    }

    #[tokio::test]
    async fn test_events_map_missing_marker_to_none() {
        let (model, _) = model(descriptor());
        let range = DateRange::new(
            parse_datetime("2011-01-01").unwrap(),
            parse_datetime("2011-01-31").unwrap(),
        );

        let events = model.get_events("F1", "L1", "H.meting", &range).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value, None);
        assert_eq!(events[1].value, Some(1.5));
    }

    #[tokio::test]
    async fn test_empty_range_issues_no_query() {
        let (model, memory) = model(descriptor());
        let range = DateRange::new(
            parse_datetime("2011-02-01").unwrap(),
            parse_datetime("2011-01-01").unwrap(),
        );

        let events = model.get_events("F1", "L1", "H.meting", &range).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(memory.calls(QueryKind::TimeSeries), 0);
    }

    #[tokio::test]
    async fn test_filter_root_ignored_without_custom_filter() {
        let mut d = descriptor();
        d.filter_tree_root = Some("root".to_string());
        let (model, _) = model(d);

        let tree = model.get_filters(&FilterSelection::default());
        let top = tree.walk().await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "root");
    }

    #[tokio::test]
    async fn test_filter_root_applied_with_custom_filter() {
        let mut d = descriptor();
        d.usecustomfilter = true;
        d.filter_tree_root = Some("root".to_string());
        let (model, _) = model(d);

        let top = model
            .get_filters(&FilterSelection::default())
            .walk()
            .await
            .unwrap();
        let ids: Vec<_> = top.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["F1", "F2"]);

        let overridden = model
            .get_filters(&FilterSelection {
                usecustomfilter: None,
                root_override: Some("F1".to_string()),
            })
            .walk()
            .await
            .unwrap();
        assert!(overridden.is_empty());
    }

    #[tokio::test]
    async fn test_custom_filter_list_replaces_topology() {
        let mut d = descriptor();
        d.usecustomfilter = true;
        d.customfilter = vec![FilterNode::new("c", "Custom", None)];
        let (model, memory) = model(d);

        let top = model
            .get_filters(&FilterSelection::default())
            .walk()
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "Custom");
        assert_eq!(memory.calls(QueryKind::Filters), 0);
    }

    #[tokio::test]
    async fn test_query_failure_is_data_source_error() {
        let (model, memory) = model(descriptor());
        memory.fail_on(Some(QueryKind::Parameters));

        let err = model.get_parameters("F1").await.unwrap_err();
        assert_eq!(err.http_status_code(), 503);
    }

    #[test]
    fn test_validate_requires_backend_settings() {
        let d = SourceDescriptor::new("fews", "FEWS", BackendKind::Jdbc2ei);
        assert!(d.validate().is_err());

        let mut d = SourceDescriptor::new("fews", "FEWS", BackendKind::Jdbc2ei);
        d.jdbc_url = "http://localhost:8080/jdbc2ei".to_string();
        d.jdbc_tag_name = "fews".to_string();
        assert!(d.validate().is_ok());
        assert!(SourceModel::connect(d, Some(Duration::from_secs(60))).is_ok());
    }

    #[test]
    fn test_descriptor_defaults_from_yaml() {
        let yaml = "slug: fews\nname: FEWS\njdbc_url: http://x\njdbc_tag_name: t\n";
        let d: SourceDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.backend, BackendKind::Jdbc2ei);
        assert!(d.cache_enabled);
        assert!(!d.usecustomfilter);
        assert_eq!(d.default_period_days, DEFAULT_PERIOD_DAYS);
    }
}
