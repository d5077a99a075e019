use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::config_sync::{ExportReport, ImportReport};
use crate::AppState;

pub async fn export_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ExportReport>>, ApiError> {
    let report = state
        .config_sync
        .export()
        .map_err(|e| ApiError::internal(format!("Configuration export failed: {e}")))?;
    Ok(JSend::success(report))
}

pub async fn import_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ImportReport>>, ApiError> {
    let report = state
        .config_sync
        .import()
        .map_err(|e| ApiError::internal(format!("Configuration import failed: {e}")))?;
    Ok(JSend::success(report))
}
