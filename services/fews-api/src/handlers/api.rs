//! Browsable REST API: sources, filters, parameters, locations and
//! time series, each listing linking to the next level down.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::Response,
    Json,
};
use serde::Serialize;

use fews_common::{Event, FewsError};
use jdbc_source::{FilterTreeItem, SourceModel};
use renderer::OutputFormat;

use super::{encode_segment, payload_response};
use crate::adapter::SeriesQuery;
use crate::error::ApiResult;
use crate::params::RequestParams;
use crate::state::AppState;

/// `{"data": [...]}` envelope used by every listing.
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

/// Folders carry `children`, leaves carry `url`.
#[derive(Debug, Serialize)]
pub struct FilterEntry {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FilterEntry>>,
}

#[derive(Debug, Serialize)]
pub struct LocationEntry {
    pub title: String,
    pub url: String,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Serialize)]
pub struct Representation {
    pub url: String,
    pub format: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TimeseriesResponse {
    pub data: Vec<Event>,
    pub parameter_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub alternative_representations: Vec<Representation>,
}

fn filters_url(base: &str, source: &str) -> String {
    format!("{}/api/sources/{}/filters", base, encode_segment(source))
}

fn parameters_url(base: &str, source: &str, filter: &str) -> String {
    format!(
        "{}/{}/parameters",
        filters_url(base, source),
        encode_segment(filter)
    )
}

fn locations_url(base: &str, source: &str, filter: &str, parameter: &str) -> String {
    format!(
        "{}/{}/locations",
        parameters_url(base, source, filter),
        encode_segment(parameter)
    )
}

fn timeseries_url(base: &str, source: &str, filter: &str, parameter: &str, location: &str) -> String {
    format!(
        "{}/{}/timeseries",
        locations_url(base, source, filter, parameter),
        encode_segment(location)
    )
}

fn filter_entries(base: &str, source: &str, items: Vec<FilterTreeItem>) -> Vec<FilterEntry> {
    items
        .into_iter()
        .map(|item| {
            if item.is_leaf() {
                FilterEntry {
                    url: Some(parameters_url(base, source, &item.id)),
                    title: item.name,
                    children: None,
                }
            } else {
                FilterEntry {
                    title: item.name,
                    url: None,
                    children: Some(filter_entries(base, source, item.children)),
                }
            }
        })
        .collect()
}

/// GET /api/sources
pub async fn sources_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Listing<Link>> {
    metrics::counter!("fews_requests_total", "endpoint" => "sources").increment(1);

    let data = state
        .sources
        .iter()
        .map(|s| Link {
            title: s.name().to_string(),
            url: filters_url(&state.base_url, s.slug()),
        })
        .collect();
    Json(Listing { data })
}

/// GET /api/sources/:source/filters
pub async fn filters_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(source_slug): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Listing<FilterEntry>>> {
    metrics::counter!("fews_requests_total", "endpoint" => "filters").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let source = state.source(&source_slug)?;
    let items = source.get_filters(&params.filter_selection()).walk().await?;

    Ok(Json(Listing {
        data: filter_entries(&state.base_url, source.slug(), items),
    }))
}

/// GET /api/sources/:source/filters/:filter/parameters
pub async fn parameters_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((source_slug, filter_id)): Path<(String, String)>,
) -> ApiResult<Json<Listing<Link>>> {
    metrics::counter!("fews_requests_total", "endpoint" => "parameters").increment(1);

    let source = state.source(&source_slug)?;
    let data = source
        .get_parameters(&filter_id)
        .await?
        .into_iter()
        .map(|p| Link {
            url: locations_url(&state.base_url, source.slug(), &filter_id, &p.id),
            title: p.name,
        })
        .collect();
    Ok(Json(Listing { data }))
}

/// GET /api/sources/:source/filters/:filter/parameters/:parameter/locations
pub async fn locations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((source_slug, filter_id, parameter_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Listing<LocationEntry>>> {
    metrics::counter!("fews_requests_total", "endpoint" => "locations").increment(1);

    let source = state.source(&source_slug)?;
    let data = source
        .get_locations(&filter_id, Some(&parameter_id))
        .await?
        .into_iter()
        .map(|l| LocationEntry {
            url: timeseries_url(
                &state.base_url,
                source.slug(),
                &filter_id,
                &parameter_id,
                &l.id,
            ),
            title: l.name,
            longitude: l.longitude,
            latitude: l.latitude,
        })
        .collect();
    Ok(Json(Listing { data }))
}

fn single_location_query(
    params: &RequestParams,
    source: &SourceModel,
    filter: String,
    parameter: String,
    location: String,
) -> ApiResult<SeriesQuery> {
    let range = source.date_resolver().resolve(&params.date_input())?;
    Ok(SeriesQuery {
        filter,
        parameter,
        locations: vec![location],
        range,
        ignore_cache: params.ignore_cache,
    })
}

/// GET .../locations/:location/timeseries
pub async fn timeseries_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((source_slug, filter_id, parameter_id, location_id)): Path<(String, String, String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<TimeseriesResponse>> {
    metrics::counter!("fews_requests_total", "endpoint" => "timeseries").increment(1);

    let params = RequestParams::from_pairs(&pairs)?;
    let source = state.source(&source_slug)?;

    let base = timeseries_url(
        &state.base_url,
        source.slug(),
        &filter_id,
        &parameter_id,
        &location_id,
    );
    let alternative_representations = [OutputFormat::Csv, OutputFormat::Png, OutputFormat::Html]
        .into_iter()
        .map(|format| Representation {
            url: format!("{}/{}", base, format.as_str()),
            format: format.as_str(),
        })
        .collect();

    let query = single_location_query(&params, &source, filter_id, parameter_id, location_id)?;
    let series = state
        .adapter(&source)
        .series(&query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| FewsError::NoLocations(format!("location '{}'", query.locations[0])))?;

    Ok(Json(TimeseriesResponse {
        data: series.events().to_vec(),
        parameter_name: series.parameter.name,
        unit: series.parameter.unit,
        alternative_representations,
    }))
}

/// GET .../locations/:location/timeseries/:format
pub async fn timeseries_format_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((source_slug, filter_id, parameter_id, location_id, format)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    metrics::counter!("fews_requests_total", "endpoint" => "timeseries_export").increment(1);

    let format = OutputFormat::from_query_param(&format)?;
    let params = RequestParams::from_pairs(&pairs)?;
    let source = state.source(&source_slug)?;

    let query = single_location_query(&params, &source, filter_id, parameter_id, location_id)?;
    let payload = state
        .adapter(&source)
        .values(&query, format, params.image_size())
        .await?;
    Ok(payload_response(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_quote_ids() {
        let url = timeseries_url("http://h", "fews", "A/B", "H.meting", "loc 1");
        assert_eq!(
            url,
            "http://h/api/sources/fews/filters/A%2FB/parameters/H.meting/locations/loc%201/timeseries"
        );
    }

    #[test]
    fn test_filter_entries_split_folders_and_leaves() {
        let items = vec![FilterTreeItem {
            id: "root".to_string(),
            name: "Root".to_string(),
            children: vec![FilterTreeItem {
                id: "leaf".to_string(),
                name: "Leaf".to_string(),
                children: vec![],
            }],
        }];
        let entries = filter_entries("http://h", "s", items);
        let json = serde_json::to_value(&entries).unwrap();

        assert_eq!(json[0]["title"], "Root");
        assert!(json[0].get("url").is_none());
        assert_eq!(json[0]["children"][0]["title"], "Leaf");
        assert_eq!(
            json[0]["children"][0]["url"],
            "http://h/api/sources/s/filters/leaf/parameters"
        );
    }
}
