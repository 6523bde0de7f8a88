//! Conversion of [`FewsError`] into HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use fews_common::FewsError;

/// JSON error body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExceptionResponse {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ExceptionResponse {
    pub fn from_error(err: &FewsError) -> Self {
        Self {
            type_: err.kind().to_string(),
            title: title(err).to_string(),
            status: err.http_status_code(),
            detail: err.to_string(),
        }
    }
}

fn title(err: &FewsError) -> &'static str {
    match err {
        FewsError::DataSource { .. } => "Data source unavailable",
        FewsError::InvalidDate(_) => "Invalid date",
        FewsError::MalformedTopology(_) => "Malformed filter topology",
        FewsError::NoLocations(_) => "No data for this selection",
        FewsError::SourceNotFound(_) => "Source not found",
        FewsError::InvalidParameter { .. } => "Invalid parameter value",
        FewsError::Render(_) => "Rendering failed",
        FewsError::Cache(_) => "Cache error",
        FewsError::Config(_) => "Configuration error",
    }
}

/// Handler error. Every failure reaches the client through this type.
#[derive(Debug)]
pub struct ApiError(pub FewsError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<FewsError> for ApiError {
    fn from(err: FewsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ExceptionResponse::from_error(&self.0);
        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(kind = body.type_.as_str(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(kind = body.type_.as_str(), error = %self.0, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}
