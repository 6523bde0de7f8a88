//! In-memory backend.
//!
//! Serves the FEWS views from a [`MemoryDataset`], either built in code or
//! loaded from a YAML file. Counts calls per query kind and can be told to
//! fail, which makes it the backend of choice for tests and demos.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use fews_common::time::source_offset;
use fews_common::{FewsError, FewsResult, FilterNode};

use crate::executor::{QueryDescriptor, QueryExecutor, QueryKind, Row, Value};

/// One row of the FEWS `filters` view: a location carrying a parameter under
/// a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub filter_id: String,
    pub parameter_id: String,
    pub location_id: String,
    pub location_name: String,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub filter_id: String,
    pub location_id: String,
    pub parameter_id: String,
    /// Naive GMT+1 timestamp.
    pub time: NaiveDateTime,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub flag: Option<i64>,
}

/// Tables backing a [`MemoryExecutor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDataset {
    #[serde(default)]
    pub filters: Vec<FilterNode>,
    #[serde(default)]
    pub entries: Vec<FilterEntry>,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
    #[serde(default)]
    pub values: Vec<ValueRecord>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dataset from a YAML file.
    pub fn from_yaml_file(path: &Path) -> FewsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FewsError::Config(format!("Failed to read dataset {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            FewsError::Config(format!("Failed to parse dataset {}: {}", path.display(), e))
        })
    }

    pub fn filter(mut self, id: &str, name: &str, parent_id: Option<&str>) -> Self {
        self.filters.push(FilterNode::new(id, name, parent_id));
        self
    }

    pub fn parameter(mut self, id: &str, name: &str, unit: Option<&str>) -> Self {
        self.parameters.push(ParameterRecord {
            id: id.to_string(),
            name: name.to_string(),
            unit: unit.map(str::to_string),
        });
        self
    }

    pub fn entry(
        mut self,
        filter_id: &str,
        parameter_id: &str,
        location_id: &str,
        location_name: &str,
        longitude: f64,
        latitude: f64,
    ) -> Self {
        self.entries.push(FilterEntry {
            filter_id: filter_id.to_string(),
            parameter_id: parameter_id.to_string(),
            location_id: location_id.to_string(),
            location_name: location_name.to_string(),
            longitude,
            latitude,
        });
        self
    }

    pub fn value(
        mut self,
        filter_id: &str,
        location_id: &str,
        parameter_id: &str,
        time: NaiveDateTime,
        value: Option<f64>,
    ) -> Self {
        self.values.push(ValueRecord {
            filter_id: filter_id.to_string(),
            location_id: location_id.to_string(),
            parameter_id: parameter_id.to_string(),
            time,
            value,
            flag: None,
        });
        self
    }

    fn filter_name(&self, filter_id: &str) -> String {
        self.filters
            .iter()
            .find(|f| f.id == filter_id)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| filter_id.to_string())
    }

    fn parameter_record(&self, parameter_id: &str) -> Option<&ParameterRecord> {
        self.parameters.iter().find(|p| p.id == parameter_id)
    }

    fn rows(&self, query: &QueryDescriptor) -> Vec<Row> {
        match query {
            QueryDescriptor::Filters => self
                .filters
                .iter()
                .map(|f| {
                    vec![
                        Value::Text(f.id.clone()),
                        Value::Text(f.name.clone()),
                        f.parent_id.clone().map(Value::Text).unwrap_or(Value::Null),
                    ]
                })
                .collect(),
            QueryDescriptor::Parameters { filter_id } => {
                let filter_name = self.filter_name(filter_id);
                let mut seen = HashSet::new();
                self.entries
                    .iter()
                    .filter(|e| &e.filter_id == filter_id)
                    .filter(|e| seen.insert(e.parameter_id.clone()))
                    .map(|e| {
                        let record = self.parameter_record(&e.parameter_id);
                        let name = record
                            .map(|p| p.name.clone())
                            .unwrap_or_else(|| e.parameter_id.clone());
                        let unit = record
                            .and_then(|p| p.unit.clone())
                            .map(Value::Text)
                            .unwrap_or(Value::Null);
                        vec![
                            Value::Text(filter_name.clone()),
                            Value::Text(e.parameter_id.clone()),
                            Value::Text(name),
                            unit,
                        ]
                    })
                    .collect()
            }
            QueryDescriptor::ParameterName { parameter_id } => self
                .parameter_record(parameter_id)
                .map(|p| vec![vec![Value::Text(p.name.clone())]])
                .unwrap_or_default(),
            QueryDescriptor::Unit { parameter_id } => self
                .parameter_record(parameter_id)
                .map(|p| vec![vec![p.unit.clone().map(Value::Text).unwrap_or(Value::Null)]])
                .unwrap_or_default(),
            QueryDescriptor::Locations {
                filter_id,
                parameter_id,
            } => {
                let mut seen = HashSet::new();
                self.entries
                    .iter()
                    .filter(|e| &e.filter_id == filter_id)
                    .filter(|e| parameter_id.as_ref().map_or(true, |p| &e.parameter_id == p))
                    .filter(|e| seen.insert(e.location_id.clone()))
                    .map(|e| {
                        vec![
                            Value::Double(e.longitude),
                            Value::Double(e.latitude),
                            Value::Text(e.location_name.clone()),
                            Value::Text(e.location_id.clone()),
                        ]
                    })
                    .collect()
            }
            QueryDescriptor::TimeSeries {
                filter_id,
                location_id,
                parameter_id,
                start,
                end,
            } => {
                let start = start.with_timezone(&source_offset()).naive_local();
                let end = end.with_timezone(&source_offset()).naive_local();
                let mut matching: Vec<&ValueRecord> = self
                    .values
                    .iter()
                    .filter(|v| {
                        &v.filter_id == filter_id
                            && &v.location_id == location_id
                            && &v.parameter_id == parameter_id
                            && v.time >= start
                            && v.time <= end
                    })
                    .collect();
                matching.sort_by_key(|v| v.time);
                matching
                    .into_iter()
                    .map(|v| {
                        vec![
                            Value::DateTime(v.time),
                            v.value.map(Value::Double).unwrap_or(Value::Null),
                            v.flag.map(Value::Int).unwrap_or(Value::Null),
                            Value::Null,
                            Value::Null,
                        ]
                    })
                    .collect()
            }
        }
    }
}

/// Executor answering queries from a [`MemoryDataset`].
pub struct MemoryExecutor {
    dataset: MemoryDataset,
    calls: Mutex<HashMap<QueryKind, usize>>,
    failing: AtomicBool,
    fail_on: Mutex<Option<QueryKind>>,
}

impl MemoryExecutor {
    pub fn new(dataset: MemoryDataset) -> Self {
        Self {
            dataset,
            calls: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            fail_on: Mutex::new(None),
        }
    }

    pub fn dataset(&self) -> &MemoryDataset {
        &self.dataset
    }

    /// Make every query fail with a data source error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make only queries of one kind fail.
    pub fn fail_on(&self, kind: Option<QueryKind>) {
        if let Ok(mut guard) = self.fail_on.lock() {
            *guard = kind;
        }
    }

    /// Number of queries of `kind` executed so far, failed ones included.
    pub fn calls(&self, kind: QueryKind) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    fn should_fail(&self, kind: QueryKind) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_on
            .lock()
            .map(|guard| *guard == Some(kind))
            .unwrap_or(false)
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, query: &QueryDescriptor) -> FewsResult<Vec<Row>> {
        let kind = query.kind();
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(kind).or_insert(0) += 1;
        }

        if self.should_fail(kind) {
            return Err(FewsError::data_source(
                query.to_sql(),
                "memory backend set to fail",
            ));
        }

        Ok(self.dataset.rows(query))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
