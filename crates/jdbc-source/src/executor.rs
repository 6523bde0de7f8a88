//! Query executor abstraction over a FEWS JDBC-style connection.
//!
//! The executor only understands a closed set of [`QueryDescriptor`]s. Each
//! backend turns a descriptor into whatever its transport needs (SQL text for
//! Jdbc2Ei, bound SQL for Postgres, a table lookup for the in-memory backend)
//! and returns plain rows. A failing call returns `FewsError::DataSource`
//! immediately.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

use fews_common::time::{format_jdbc, from_naive, parse_datetime};
use fews_common::FewsResult;

/// A single cell returned by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    /// Naive timestamp in the source's GMT+1 clock.
    DateTime(NaiveDateTime),
}

static NULL_VALUE: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form of scalar cells. Numbers are rendered, NULL is `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Timestamp cells, read as GMT+1.
    pub fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::DateTime(ndt) => Some(from_naive(*ndt)),
            Value::Text(s) => parse_datetime(s).ok(),
            _ => None,
        }
    }
}

/// One result row.
pub type Row = Vec<Value>;

/// Cell `idx` of a row, NULL when the row is short.
pub fn cell(row: &Row, idx: usize) -> &Value {
    row.get(idx).unwrap_or(&NULL_VALUE)
}

/// Query families, used for logging, metrics and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Filters,
    Parameters,
    ParameterName,
    Unit,
    Locations,
    TimeSeries,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Filters => "filters",
            QueryKind::Parameters => "parameters",
            QueryKind::ParameterName => "parameter_name",
            QueryKind::Unit => "unit",
            QueryKind::Locations => "locations",
            QueryKind::TimeSeries => "timeseries",
        }
    }
}

/// The queries the core issues against a FEWS JDBC source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryDescriptor {
    /// Rows: `id, name, parentid`.
    Filters,
    /// Rows: `name, parameterid, parameter`.
    Parameters { filter_id: String },
    /// Rows: `name`.
    ParameterName { parameter_id: String },
    /// Rows: `unit`.
    Unit { parameter_id: String },
    /// Rows: `longitude, latitude, location, locationid`.
    Locations {
        filter_id: String,
        parameter_id: Option<String>,
    },
    /// Rows: `time, value, flag, detection, comment`.
    TimeSeries {
        filter_id: String,
        location_id: String,
        parameter_id: String,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

impl QueryDescriptor {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryDescriptor::Filters => QueryKind::Filters,
            QueryDescriptor::Parameters { .. } => QueryKind::Parameters,
            QueryDescriptor::ParameterName { .. } => QueryKind::ParameterName,
            QueryDescriptor::Unit { .. } => QueryKind::Unit,
            QueryDescriptor::Locations { .. } => QueryKind::Locations,
            QueryDescriptor::TimeSeries { .. } => QueryKind::TimeSeries,
        }
    }

    /// Topology queries describe the filter/parameter/location catalogue and
    /// may be cached in front of the executor. Values never are.
    pub fn is_topology(&self) -> bool {
        !matches!(self, QueryDescriptor::TimeSeries { .. })
    }

    /// FEWS JDBC SQL text with literals escaped.
    pub fn to_sql(&self) -> String {
        let sql = match self {
            QueryDescriptor::Filters => "select id, name, parentid from filters".to_string(),
            QueryDescriptor::Parameters { filter_id } => format!(
                "select name, parameterid, parameter from filters where id={}",
                quote(filter_id)
            ),
            QueryDescriptor::ParameterName { parameter_id } => format!(
                "select name from parameters where id={}",
                quote(parameter_id)
            ),
            QueryDescriptor::Unit { parameter_id } => format!(
                "select unit from parameters where id={}",
                quote(parameter_id)
            ),
            QueryDescriptor::Locations {
                filter_id,
                parameter_id,
            } => {
                let mut sql = format!(
                    "select longitude, latitude, location, locationid from filters where id={}",
                    quote(filter_id)
                );
                if let Some(parameter_id) = parameter_id {
                    sql.push_str(&format!(" and parameterid={}", quote(parameter_id)));
                }
                sql
            }
            QueryDescriptor::TimeSeries {
                filter_id,
                location_id,
                parameter_id,
                start,
                end,
            } => format!(
                "select time, value, flag, detection, comment from extimeseries \
                 where filterid={} and locationid={} and parameterid={} \
                 and time between '{}' and '{}'",
                quote(filter_id),
                quote(location_id),
                quote(parameter_id),
                format_jdbc(start),
                format_jdbc(end)
            ),
        };

        if sql.contains('"') {
            tracing::warn!(query = %sql, "Query contains double quotes, is that intended?");
        }
        sql
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Quote a string literal, doubling embedded single quotes.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Executes query descriptors against a data source.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run the query and return all rows, or fail with `DataSource`.
    async fn execute(&self, query: &QueryDescriptor) -> FewsResult<Vec<Row>>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Drop any cached results. Returns the number of entries removed.
    async fn clear_cache(&self) -> u64 {
        0
    }
}
