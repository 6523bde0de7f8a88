//! FEWS API library.
//!
//! Exposes FEWS JDBC time series as a browsable REST API and as map-layer
//! adapter endpoints (extent, graph images, value exports, search).

pub mod adapter;
pub mod config;
pub mod error;
pub mod handlers;
pub mod params;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

const SERIES_PATH: &str =
    "/api/sources/:source/filters/:filter/parameters/:parameter/locations/:location/timeseries";

/// Build the full router. `prometheus` is `None` when no recorder is
/// installed, e.g. in tests.
pub fn create_router(state: Arc<AppState>, prometheus: Option<PrometheusHandle>) -> Router {
    Router::new()
        // REST API
        .route("/api", get(handlers::api::sources_handler))
        .route("/api/sources", get(handlers::api::sources_handler))
        .route(
            "/api/sources/:source/filters",
            get(handlers::api::filters_handler),
        )
        .route(
            "/api/sources/:source/filters/:filter/parameters",
            get(handlers::api::parameters_handler),
        )
        .route(
            "/api/sources/:source/filters/:filter/parameters/:parameter/locations",
            get(handlers::api::locations_handler),
        )
        .route(SERIES_PATH, get(handlers::api::timeseries_handler))
        .route(
            &format!("{}/:format", SERIES_PATH),
            get(handlers::api::timeseries_format_handler),
        )
        // Adapter
        .route("/adapter/extent", get(handlers::adapter::extent_handler))
        .route("/adapter/image", get(handlers::adapter::image_handler))
        .route("/adapter/values", get(handlers::adapter::values_handler))
        .route("/adapter/search", get(handlers::adapter::search_handler))
        .route("/adapter/symbol", get(handlers::adapter::symbol_handler))
        // Admin
        .route(
            "/admin/cache/clear",
            post(handlers::admin::clear_cache_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(Extension(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
