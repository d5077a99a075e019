use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::cache::CacheBackend;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub cache_entries_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// A regular cache clear. The tracked file bin ignores it.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let deleted = state
        .cache
        .clear_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSend::success(PurgeResponse {
        cache_entries_deleted: deleted,
    }))
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let deleted = state
        .cache
        .purge_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::warn!(entries = deleted, "Purged tracked file cache");

    Ok(JSend::success(PurgeResponse {
        cache_entries_deleted: deleted,
    }))
}
