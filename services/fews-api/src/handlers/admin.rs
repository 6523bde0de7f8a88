//! Administrative endpoints.

use std::sync::Arc;

use axum::{extract::Extension, Json};

use crate::error::ApiResult;
use crate::state::{AppState, CacheClearReport};

/// POST /admin/cache/clear
pub async fn clear_cache_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Json<CacheClearReport>> {
    metrics::counter!("fews_requests_total", "endpoint" => "cache_clear").increment(1);
    Ok(Json(state.clear_caches().await?))
}
