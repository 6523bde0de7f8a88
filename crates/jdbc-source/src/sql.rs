//! Direct PostgreSQL backend for FEWS databases exposing the JDBC views.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row as _};

use fews_common::time::source_offset;
use fews_common::{FewsError, FewsResult};

use crate::executor::{QueryDescriptor, QueryExecutor, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Text,
    Float,
    Int,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Bound statement for a descriptor, with the column layout to decode.
struct Statement {
    sql: String,
    binds: Vec<Bind>,
    columns: &'static [Column],
}

fn statement(query: &QueryDescriptor) -> Statement {
    use Column::*;

    match query {
        QueryDescriptor::Filters => Statement {
            sql: "SELECT DISTINCT id, name, parentid FROM filters".to_string(),
            binds: vec![],
            columns: &[Text, Text, Text],
        },
        QueryDescriptor::Parameters { filter_id } => Statement {
            sql: "SELECT DISTINCT name, parameterid, parameter FROM filters WHERE id = $1"
                .to_string(),
            binds: vec![Bind::Text(filter_id.clone())],
            columns: &[Text, Text, Text],
        },
        QueryDescriptor::ParameterName { parameter_id } => Statement {
            sql: "SELECT name FROM parameters WHERE id = $1".to_string(),
            binds: vec![Bind::Text(parameter_id.clone())],
            columns: &[Text],
        },
        QueryDescriptor::Unit { parameter_id } => Statement {
            sql: "SELECT unit FROM parameters WHERE id = $1".to_string(),
            binds: vec![Bind::Text(parameter_id.clone())],
            columns: &[Text],
        },
        QueryDescriptor::Locations {
            filter_id,
            parameter_id,
        } => {
            let mut sql = "SELECT DISTINCT longitude, latitude, location, locationid \
                           FROM filters WHERE id = $1"
                .to_string();
            let mut binds = vec![Bind::Text(filter_id.clone())];
            if let Some(parameter_id) = parameter_id {
                sql.push_str(" AND parameterid = $2");
                binds.push(Bind::Text(parameter_id.clone()));
            }
            Statement {
                sql,
                binds,
                columns: &[Float, Float, Text, Text],
            }
        }
        QueryDescriptor::TimeSeries {
            filter_id,
            location_id,
            parameter_id,
            start,
            end,
        } => Statement {
            sql: "SELECT time, value, flag, detection, comment FROM extimeseries \
                  WHERE filterid = $1 AND locationid = $2 AND parameterid = $3 \
                  AND time BETWEEN $4 AND $5 ORDER BY time"
                .to_string(),
            binds: vec![
                Bind::Text(filter_id.clone()),
                Bind::Text(location_id.clone()),
                Bind::Text(parameter_id.clone()),
                Bind::Timestamp(start.with_timezone(&source_offset()).naive_local()),
                Bind::Timestamp(end.with_timezone(&source_offset()).naive_local()),
            ],
            columns: &[Timestamp, Float, Int, Int, Text],
        },
    }
}

/// Executor reading the FEWS views straight from PostgreSQL.
pub struct SqlExecutor {
    pool: PgPool,
}

impl SqlExecutor {
    /// Create a lazily connecting pool. Connection failures surface on the
    /// first query, not here.
    pub fn connect_lazy(database_url: &str, timeout: Duration) -> FewsResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect_lazy(database_url)
            .map_err(|e| FewsError::Config(format!("Invalid database URL: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for SqlExecutor {
    async fn execute(&self, query: &QueryDescriptor) -> FewsResult<Vec<Row>> {
        let stmt = statement(query);

        let mut q = sqlx::query(&stmt.sql);
        for bind in &stmt.binds {
            q = match bind {
                Bind::Text(s) => q.bind(s.clone()),
                Bind::Timestamp(ts) => q.bind(*ts),
            };
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FewsError::data_source(query.to_sql(), e))?;

        rows.iter()
            .map(|row| decode_row(row, stmt.columns))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| FewsError::data_source(query.to_sql(), e))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn decode_row(row: &PgRow, columns: &[Column]) -> Result<Row, sqlx::Error> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| -> Result<Value, sqlx::Error> {
            let value = match column {
                Column::Text => row
                    .try_get::<Option<String>, _>(idx)?
                    .map(Value::Text),
                Column::Float => row.try_get::<Option<f64>, _>(idx)?.map(Value::Double),
                Column::Int => match row.try_get::<Option<i64>, _>(idx) {
                    Ok(v) => v.map(Value::Int),
                    Err(_) => row
                        .try_get::<Option<i32>, _>(idx)?
                        .map(|v| Value::Int(v as i64)),
                },
                Column::Timestamp => row
                    .try_get::<Option<NaiveDateTime>, _>(idx)?
                    .map(Value::DateTime),
            };
            Ok(value.unwrap_or(Value::Null))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fews_common::time::parse_datetime;

    #[test]
    fn test_timeseries_statement_binds_local_times() {
        let stmt = statement(&QueryDescriptor::TimeSeries {
            filter_id: "F".to_string(),
            location_id: "L".to_string(),
            parameter_id: "P".to_string(),
            start: parse_datetime("2011-01-01T00:00:00Z").unwrap(),
            end: parse_datetime("2011-01-02").unwrap(),
        });

        assert_eq!(stmt.binds.len(), 5);
        assert_eq!(stmt.columns.len(), 5);
        match &stmt.binds[3] {
            Bind::Timestamp(ts) => assert_eq!(ts.to_string(), "2011-01-01 01:00:00"),
            other => panic!("unexpected bind {:?}", other),
        }
    }

    #[test]
    fn test_location_statement_parameter_is_optional() {
        let without = statement(&QueryDescriptor::Locations {
            filter_id: "F".to_string(),
            parameter_id: None,
        });
        assert_eq!(without.binds.len(), 1);
        assert!(!without.sql.contains("$2"));

        let with = statement(&QueryDescriptor::Locations {
            filter_id: "F".to_string(),
            parameter_id: Some("P".to_string()),
        });
        assert_eq!(with.binds, vec![Bind::Text("F".to_string()), Bind::Text("P".to_string())]);
    }
}
