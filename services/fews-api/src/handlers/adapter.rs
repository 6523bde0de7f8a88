//! Map-layer adapter endpoints.
//!
//! All selection happens through query parameters: `source`, `filter`,
//! `parameter`, repeated `location`, the date window and output options.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::Response,
    Json,
};
use serde::Serialize;

use fews_common::{BoundingBox, FewsError};
use jdbc_source::SourceModel;
use renderer::symbol::{parse_hex_color, DEFAULT_SYMBOL_COLOR, DEFAULT_SYMBOL_SIZE};
use renderer::OutputFormat;

use super::payload_response;
use crate::adapter::{SearchHit, SeriesQuery};
use crate::error::ApiResult;
use crate::params::RequestParams;
use crate::state::AppState;

/// Search radius in degrees when the request carries none.
pub const DEFAULT_SEARCH_RADIUS: f64 = 0.05;

#[derive(Debug, Serialize)]
pub struct ExtentResponse {
    /// `[min_x, min_y, max_x, max_y]`
    pub bbox: [f64; 4],
    #[serde(flatten)]
    pub extent: BoundingBox,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub data: Vec<SearchHit>,
}

fn series_query(params: &RequestParams, source: &SourceModel) -> ApiResult<SeriesQuery> {
    Ok(SeriesQuery {
        filter: params.require_filter()?.to_string(),
        parameter: params.require_parameter()?.to_string(),
        locations: params.locations.clone(),
        range: source.date_resolver().resolve(&params.date_input())?,
        ignore_cache: params.ignore_cache,
    })
}

/// GET /adapter/extent
pub async fn extent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ExtentResponse>> {
    metrics::counter!("fews_requests_total", "endpoint" => "extent").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let source = state.source(params.require_source()?)?;
    let extent = state
        .adapter(&source)
        .extent(
            params.require_filter()?,
            params.parameter.as_deref(),
            &params.locations,
        )
        .await?;

    Ok(Json(ExtentResponse {
        bbox: extent.to_array(),
        extent,
    }))
}

/// GET /adapter/image
pub async fn image_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    metrics::counter!("fews_requests_total", "endpoint" => "image").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let source = state.source(params.require_source()?)?;
    let query = series_query(&params, &source)?;

    let payload = state
        .adapter(&source)
        .image(&query, params.image_size())
        .await?;
    Ok(payload_response(payload))
}

/// GET /adapter/values
pub async fn values_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    metrics::counter!("fews_requests_total", "endpoint" => "values").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let format = params.output_format(OutputFormat::Csv)?;
    let source = state.source(params.require_source()?)?;
    let query = series_query(&params, &source)?;

    let payload = state
        .adapter(&source)
        .values(&query, format, params.image_size())
        .await?;
    Ok(payload_response(payload))
}

/// GET /adapter/search
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<SearchResponse>> {
    metrics::counter!("fews_requests_total", "endpoint" => "search").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let source = state.source(params.require_source()?)?;
    let (x, y) = match (params.x, params.y) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(FewsError::invalid_parameter(
                "x",
                "both x and y are required",
            )
            .into())
        }
    };

    let data = state
        .adapter(&source)
        .search(
            params.require_filter()?,
            params.parameter.as_deref(),
            x,
            y,
            params.radius.unwrap_or(DEFAULT_SEARCH_RADIUS),
        )
        .await?;
    Ok(Json(SearchResponse { data }))
}

/// GET /adapter/symbol
pub async fn symbol_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    metrics::counter!("fews_requests_total", "endpoint" => "symbol").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let color = match params.color.as_deref() {
        Some(color) => parse_hex_color(color)?,
        None => DEFAULT_SYMBOL_COLOR,
    };
    let payload = state
        .renderer
        .symbol(params.size.unwrap_or(DEFAULT_SYMBOL_SIZE), color)?;
    Ok(payload_response(payload))
}
