//! Error types for the server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Route error type that converts to HTTP responses
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    /// Upstream call failed; surfaced with the given status
    Upstream(StatusCode, String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Upstream(status, msg) => {
                tracing::warn!(status = %status, error = %msg, "Upstream failure");
                (status, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<image_disk_cache::ImageCacheError> for AppError {
    fn from(err: image_disk_cache::ImageCacheError) -> Self {
        use image_disk_cache::ImageCacheError;

        match err {
            e if e.is_client_error() => AppError::BadRequest(e.to_string()),
            ImageCacheError::UpstreamStatus(404) => AppError::NotFound("Image not found".into()),
            e @ (ImageCacheError::UpstreamStatus(_)
            | ImageCacheError::EmptyBody
            | ImageCacheError::Http(_)) => {
                AppError::Upstream(StatusCode::BAD_GATEWAY, e.to_string())
            }
            e => AppError::Internal(e.to_string()),
        }
    }
}

/// Startup failures
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Cache(ttl_cache::CacheError),
    ImageCache(image_disk_cache::ImageCacheError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Cache(err) => write!(f, "Cache error: {}", err),
            ServerError::ImageCache(err) => write!(f, "Image cache error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Cache(err) => Some(err),
            ServerError::ImageCache(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            ServerError::Config(_) => None,
        }
    }
}

impl From<ttl_cache::CacheError> for ServerError {
    fn from(err: ttl_cache::CacheError) -> Self {
        ServerError::Cache(err)
    }
}

impl From<image_disk_cache::ImageCacheError> for ServerError {
    fn from(err: image_disk_cache::ImageCacheError) -> Self {
        ServerError::ImageCache(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
