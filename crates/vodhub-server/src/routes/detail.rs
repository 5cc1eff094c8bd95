use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::routes::{required, ListResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    source: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetailRequest {
    source: Option<String>,
    /// Catalog ids are sometimes sent as numbers
    id: Option<Value>,
}

/// GET /api/detail?source=..&id=..
/// Returns `{"list": [record]}`.
pub async fn get_detail(
    State(state): State<AppState>,
    Query(params): Query<DetailParams>,
) -> Result<Json<ListResponse<Vec<Value>>>, AppError> {
    let source = required(params.source, "source")?;
    let id = required(params.id, "id")?;

    let record = resolve(&state, &source, &id).await?;
    Ok(Json(ListResponse { list: vec![record] }))
}

/// POST /api/detail
/// Returns the bare record.
pub async fn post_detail(
    State(state): State<AppState>,
    Json(body): Json<DetailRequest>,
) -> Result<Json<Value>, AppError> {
    let source = required(body.source, "source")?;
    let id = required(body.id.as_ref().and_then(scalar_to_string), "id")?;

    Ok(Json(resolve(&state, &source, &id).await?))
}

async fn resolve(state: &AppState, source_key: &str, id: &str) -> Result<Value, AppError> {
    let source = state
        .sites
        .find(source_key)
        .await
        .ok_or_else(|| AppError::BadRequest(format!("Unknown source: {}", source_key)))?;

    state
        .details
        .resolve(&source, id)
        .await
        .map_err(|e| {
            AppError::Upstream(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch detail: {}", e),
            )
        })?
        .ok_or_else(|| AppError::NotFound("Detail not found".into()))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
