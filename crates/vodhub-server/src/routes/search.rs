use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::routes::{required, ListResponse};
use crate::search::SearchEvent;
use crate::state::AppState;
use catalog_client::SearchResultItem;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    wd: Option<String>,
    stream: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SingleSearchRequest {
    source: Option<String>,
    wd: Option<String>,
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "yes"))
}

/// GET /api/search?wd=..&stream=1
/// Streams one SSE data frame per source with results, then a `done` frame.
pub async fn stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if !is_truthy(params.stream.as_deref()) {
        return Err(AppError::BadRequest("This endpoint only supports stream=1".into()));
    }
    let keyword = required(params.wd, "wd")?;

    let sources = state.sites.sources().await;
    debug!(keyword = %keyword, sources = sources.len(), "Starting streaming search");

    let events = state.search.stream(sources.to_vec(), keyword);
    let stream = ReceiverStream::new(events).map(|event| Ok(to_sse(event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: SearchEvent) -> Event {
    match event {
        SearchEvent::Results { source_key, items } => {
            debug!(source = %source_key, hits = items.len(), "Streaming source results");
            Event::default()
                .json_data(ListResponse { list: items })
                .unwrap_or_else(|e| {
                    warn!(source = %source_key, error = %e, "Failed to encode results");
                    Event::default().comment("encode error")
                })
        }
        SearchEvent::Done => Event::default().event("done").data(r#"{"done":true}"#),
    }
}

/// POST /api/search
/// Searches exactly one source; results omit episode groups.
pub async fn single(
    State(state): State<AppState>,
    Json(body): Json<SingleSearchRequest>,
) -> Result<Json<ListResponse<Vec<SearchResultItem>>>, AppError> {
    let source_key = required(body.source, "source")?;
    let keyword = required(body.wd, "wd")?;

    let source = state
        .sites
        .find(&source_key)
        .await
        .ok_or_else(|| AppError::BadRequest(format!("Unknown source: {}", source_key)))?;

    let items = state
        .search
        .search_source(&source, &keyword)
        .await
        .map_err(|e| {
            AppError::Upstream(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Search failed: {}", e),
            )
        })?;

    Ok(Json(ListResponse {
        list: items.into_iter().map(SearchResultItem::without_episodes).collect(),
    }))
}
