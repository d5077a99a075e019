use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::AppState;

/// Serve the bytes of a tracked file, restoring them from the cache if needed.
/// Route: GET /config-files/:id/content
pub async fn serve_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = state
        .db
        .get_config_file(&id)?
        .ok_or_else(|| ApiError::not_found("Config file not found"))?;

    let (file, data) = state.engine.read_file(&record)?;
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    if let Ok(value) = format!("inline; filename=\"{}\"", file.filename).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Re-uploads replace the bytes in place.
    headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));

    Ok(response)
}
