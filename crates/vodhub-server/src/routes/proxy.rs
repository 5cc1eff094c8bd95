use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::constants::PROXY_TIMEOUT;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/proxy/{source}
/// Forwards the query string to the source's API verbatim. Not cached.
pub async fn proxy(
    State(state): State<AppState>,
    Path(source_key): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let source = state
        .sites
        .find(&source_key)
        .await
        .ok_or_else(|| AppError::BadRequest(format!("Unknown source: {}", source_key)))?;

    let body = state
        .catalog
        .passthrough(&source, query.as_deref(), PROXY_TIMEOUT)
        .await
        .map_err(|e| {
            AppError::Upstream(StatusCode::BAD_GATEWAY, format!("Proxy request failed: {}", e))
        })?;

    Ok(Json(body))
}
