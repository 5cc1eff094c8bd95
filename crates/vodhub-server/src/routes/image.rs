use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use image_disk_cache::content_type_for;
use tokio_util::io::ReaderStream;

use crate::constants::IMAGE_CACHE_CONTROL;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/image/{size}/{filename}
/// Streams the cached file, downloading it on first request.
pub async fn get_image(
    State(state): State<AppState>,
    Path((size, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let image = state.images.get(&size, &filename).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CONTENT_LENGTH, image.len)
        .header(header::CACHE_CONTROL, IMAGE_CACHE_CONTROL)
        .header("X-Cache", image.status.as_header())
        .body(Body::from_stream(ReaderStream::new(image.file)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}
