use axum::extract::State;
use axum::Json;
use catalog_client::Source;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct SitesResponse {
    sites: Vec<Source>,
}

/// GET /api/sites
pub async fn list_sites(State(state): State<AppState>) -> Json<SitesResponse> {
    let sites = state.sites.sources().await;
    Json(SitesResponse {
        sites: sites.to_vec(),
    })
}
