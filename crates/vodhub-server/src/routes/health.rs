use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use ttl_cache::CacheCategory;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub backend: &'static str,
    pub search_entries: usize,
    pub detail_entries: usize,
    pub image_hits: u64,
    pub image_misses: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let images = state.images.stats();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: CacheStats {
            backend: state.cache.backend_name(),
            search_entries: state.cache.len(CacheCategory::Search).await,
            detail_entries: state.cache.len(CacheCategory::Detail).await,
            image_hits: images.hits,
            image_misses: images.misses,
        },
    })
}
