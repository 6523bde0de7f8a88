//! Jdbc2Ei XML-RPC backend.
//!
//! Every call pings the server, makes sure the source's tag is registered
//! (registering it with the connector string when it is not) and then runs
//! the query. An integer result is a Jdbc2Ei error code.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use fews_common::{FewsError, FewsResult};

use crate::executor::{QueryDescriptor, QueryExecutor, Row, Value};
use crate::xmlrpc::{encode_call, parse_response, MethodResponse, XmlRpcValue};

/// Timestamp layout Jdbc2Ei uses for `dateTime.iso8601` values.
const XMLRPC_DATE_FORMAT: &str = "%Y%m%dT%H:%M:%S";

pub struct Jdbc2EiExecutor {
    client: reqwest::Client,
    url: String,
    tag_name: String,
    connector_string: String,
}

impl Jdbc2EiExecutor {
    pub fn new(
        url: impl Into<String>,
        tag_name: impl Into<String>,
        connector_string: impl Into<String>,
        timeout: Duration,
    ) -> FewsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FewsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            tag_name: tag_name.into(),
            connector_string: connector_string.into(),
        })
    }

    async fn call(&self, method: &str, params: &[XmlRpcValue]) -> Result<MethodResponse, String> {
        let body = encode_call(method, params);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| format!("{} request failed: {}", method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{} returned HTTP {}", method, status));
        }

        let text = response
            .text()
            .await
            .map_err(|e| format!("{} response unreadable: {}", method, e))?;

        parse_response(&text).map_err(|e| format!("{} response invalid: {}", method, e))
    }

    async fn ping(&self) -> Result<(), String> {
        match self
            .call("Ping.isAlive", &[XmlRpcValue::str(""), XmlRpcValue::str("")])
            .await?
        {
            MethodResponse::Value(_) => Ok(()),
            MethodResponse::Fault { code, message } => {
                Err(format!("Jdbc2Ei server not available ({}: {})", code, message))
            }
        }
    }

    /// Register the tag when the server does not know it yet.
    async fn ensure_tag(&self) -> Result<(), String> {
        let known = matches!(
            self.call(
                "Config.get",
                &[
                    XmlRpcValue::str(""),
                    XmlRpcValue::str(""),
                    XmlRpcValue::str(self.tag_name.as_str()),
                ],
            )
            .await,
            Ok(MethodResponse::Value(_))
        );
        if known {
            return Ok(());
        }

        debug!(tag = %self.tag_name, "Registering Jdbc2Ei tag");
        match self
            .call(
                "Config.put",
                &[
                    XmlRpcValue::str(""),
                    XmlRpcValue::str(""),
                    XmlRpcValue::str(self.tag_name.as_str()),
                    XmlRpcValue::str(self.connector_string.as_str()),
                ],
            )
            .await?
        {
            MethodResponse::Value(_) => Ok(()),
            MethodResponse::Fault { code, message } => Err(format!(
                "could not register tag '{}' ({}: {})",
                self.tag_name, code, message
            )),
        }
    }
}

#[async_trait]
impl QueryExecutor for Jdbc2EiExecutor {
    async fn execute(&self, query: &QueryDescriptor) -> FewsResult<Vec<Row>> {
        let sql = query.to_sql();

        self.ping()
            .await
            .map_err(|cause| FewsError::data_source(&sql, cause))?;
        self.ensure_tag()
            .await
            .map_err(|cause| FewsError::data_source(&sql, cause))?;

        let response = self
            .call(
                "Query.execute",
                &[
                    XmlRpcValue::str(""),
                    XmlRpcValue::str(""),
                    XmlRpcValue::str(sql.as_str()),
                    XmlRpcValue::Array(vec![XmlRpcValue::str(self.tag_name.as_str())]),
                ],
            )
            .await
            .map_err(|cause| FewsError::data_source(&sql, cause))?;

        match response {
            MethodResponse::Value(XmlRpcValue::Array(rows)) => rows
                .into_iter()
                .map(|row| match row {
                    XmlRpcValue::Array(cells) => Ok(cells.into_iter().map(to_value).collect()),
                    other => Err(FewsError::data_source(
                        &sql,
                        format!("expected a row array, got {:?}", other),
                    )),
                })
                .collect(),
            MethodResponse::Value(XmlRpcValue::Int(code)) => {
                warn!(code, query = %sql, "Jdbc2Ei returned an error code");
                Err(FewsError::data_source(&sql, format!("error code {}", code)))
            }
            MethodResponse::Value(other) => Err(FewsError::data_source(
                &sql,
                format!("unexpected result {:?}", other),
            )),
            MethodResponse::Fault { code, message } => Err(FewsError::data_source(
                &sql,
                format!("fault {}: {}", code, message),
            )),
        }
    }

    fn backend_name(&self) -> &'static str {
        "jdbc2ei"
    }
}

fn to_value(cell: XmlRpcValue) -> Value {
    match cell {
        XmlRpcValue::Int(i) => Value::Int(i),
        XmlRpcValue::Double(d) => Value::Double(d),
        XmlRpcValue::Bool(b) => Value::Bool(b),
        XmlRpcValue::Str(s) => Value::Text(s),
        XmlRpcValue::DateTime(s) => NaiveDateTime::parse_from_str(&s, XMLRPC_DATE_FORMAT)
            .map(Value::DateTime)
            .unwrap_or(Value::Text(s)),
        XmlRpcValue::Nil | XmlRpcValue::Array(_) | XmlRpcValue::Struct(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_cells_become_timestamps() {
        let value = to_value(XmlRpcValue::DateTime("20110102T13:00:00".to_string()));
        let Value::DateTime(ndt) = value else {
            panic!("expected timestamp");
        };
        assert_eq!(ndt.to_string(), "2011-01-02 13:00:00");
    }

    #[test]
    fn test_unparseable_datetime_kept_as_text() {
        let value = to_value(XmlRpcValue::DateTime("soon".to_string()));
        assert_eq!(value, Value::Text("soon".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_data_source_error() {
        let executor = Jdbc2EiExecutor::new(
            "http://127.0.0.1:9/jdbc2ei",
            "fews",
            "jdbc:vjdbc:rmi://localhost/VJdbc,FewsDataStore",
            Duration::from_millis(500),
        )
        .unwrap();

        let err = executor.execute(&QueryDescriptor::Filters).await.unwrap_err();
        match err {
            FewsError::DataSource { query, cause } => {
                assert!(query.contains("from filters"));
                assert!(cause.contains("Ping.isAlive"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
