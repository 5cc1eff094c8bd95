//! HTTP surface
//!
//! Provides /health, /api/search, /api/detail, /api/image, /api/sites and
//! /api/proxy. Anything else falls through to the static front-end.

pub mod detail;
pub mod health;
pub mod image;
pub mod proxy;
pub mod search;
pub mod sites;

use std::path::Path;

use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

/// `{"list": ...}` envelope shared by search and detail responses
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub list: T,
}

/// Reject a missing or blank parameter with 400
pub(crate) fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(format!("Missing parameter: {}", name))),
    }
}

/// API routes only
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/search", get(search::stream).post(search::single))
        .route("/api/detail", get(detail::get_detail).post(detail::post_detail))
        .route("/api/image/{size}/{filename}", get(image::get_image))
        .route("/api/sites", get(sites::list_sites))
        .route("/api/proxy/{source}", get(proxy::proxy))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes plus the static front-end for every other path
pub fn create_app(state: AppState, public_path: &Path) -> Router {
    info!(public_path = ?public_path, "Serving static files");
    let front_end =
        ServeDir::new(public_path).fallback(ServeFile::new(public_path.join("index.html")));
    create_router(state).fallback_service(front_end)
}

/// Start the HTTP server
pub async fn start_server(app: Router, port: u16) -> std::io::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
