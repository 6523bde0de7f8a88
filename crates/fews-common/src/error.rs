//! Error types for the FEWS JDBC services.

use thiserror::Error;

/// Result type alias using FewsError.
pub type FewsResult<T> = Result<T, FewsError>;

/// Primary error type for FEWS JDBC operations.
///
/// The first four variants are the core taxonomy. They travel unchanged from
/// the executor up to the HTTP layer, which is the only place that turns them
/// into responses.
#[derive(Debug, Error)]
pub enum FewsError {
    // === Core taxonomy ===
    #[error("Data source error for query [{query}]: {cause}")]
    DataSource { query: String, cause: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Malformed filter topology: node '{0}' visited twice")]
    MalformedTopology(String),

    #[error("No locations: {0}")]
    NoLocations(String),

    // === Request errors ===
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Infrastructure errors ===
    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FewsError {
    /// Build a data source error for a failed query.
    pub fn data_source(query: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        FewsError::DataSource {
            query: query.into(),
            cause: cause.to_string(),
        }
    }

    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        FewsError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FewsError::DataSource { .. } => "DataSourceError",
            FewsError::InvalidDate(_) => "InvalidDateError",
            FewsError::MalformedTopology(_) => "MalformedTopologyError",
            FewsError::NoLocations(_) => "NoLocationsError",
            FewsError::SourceNotFound(_) => "SourceNotFound",
            FewsError::InvalidParameter { .. } => "InvalidParameterValue",
            FewsError::Render(_) => "RenderError",
            FewsError::Cache(_) => "CacheError",
            FewsError::Config(_) => "ConfigError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            FewsError::InvalidDate(_) | FewsError::InvalidParameter { .. } => 400,

            FewsError::NoLocations(_) | FewsError::SourceNotFound(_) => 404,

            FewsError::MalformedTopology(_) => 502,
            FewsError::DataSource { .. } => 503,

            _ => 500,
        }
    }

    /// True when the failure means "nothing matches this selection" rather
    /// than "the backend is broken".
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, FewsError::NoLocations(_) | FewsError::InvalidDate(_))
    }
}

impl From<serde_json::Error> for FewsError {
    fn from(err: serde_json::Error) -> Self {
        FewsError::Cache(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_distinguish_no_data_from_outage() {
        let outage = FewsError::data_source("select 1", "connection refused");
        let empty = FewsError::NoLocations("filter F1".to_string());
        let bad_date = FewsError::InvalidDate("2011-13-45".to_string());

        assert_eq!(outage.http_status_code(), 503);
        assert_eq!(empty.http_status_code(), 404);
        assert_eq!(bad_date.http_status_code(), 400);

        assert!(!outage.is_empty_selection());
        assert!(empty.is_empty_selection());
    }

    #[test]
    fn test_data_source_message_carries_query() {
        let err = FewsError::data_source("select id from filters", "error code -2");
        let msg = err.to_string();
        assert!(msg.contains("select id from filters"));
        assert!(msg.contains("-2"));
        assert_eq!(err.kind(), "DataSourceError");
    }
}
