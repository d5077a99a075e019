use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::response::{ApiError, AppJson, AppQuery, JSend, Page};
use crate::storage::models::{ConfigFileRecord, DependencyKind, Dependents, FileStatus};
use crate::sync::SyncMode;
use crate::upload::ParentRef;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

/// Whether a record already has an exported config snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigStatus {
    Active,
    Pending,
}

#[derive(Debug, Serialize)]
pub struct ParentResponse {
    pub entity_type: String,
    pub entity_id: String,
    pub field: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub id: String,
    pub uri: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub status: FileStatus,
}

#[derive(Debug, Serialize)]
pub struct ConfigFileResponse {
    pub changed: Option<i64>,
    pub config_uri: String,
    pub dependencies: Dependents,
    pub file: Option<FileInfo>,
    pub filename: String,
    pub id: String,
    pub owner_id: Option<String>,
    pub parent: Option<ParentResponse>,
    pub status: ConfigStatus,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct ListConfigFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub status: Option<ConfigStatus>,
    #[serde(default)]
    pub parent_type: Option<String>,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct AttachParentRequest {
    pub parent_type: String,
    pub parent_id: String,
    #[serde(default)]
    pub parent_field: Option<String>,
    /// Dependency names keyed by kind (`module`, `theme`, `config`, `content`)
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_config_files(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListConfigFilesParams>,
) -> Result<Json<JSend<Page<ConfigFileResponse>>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let mut items = Vec::new();
    for record in state.db.get_all_config_files()? {
        if let Some(ref parent_type) = params.parent_type {
            if record.parent_type.as_ref() != Some(parent_type) {
                continue;
            }
        }
        let response = to_response(&state, &record)?;
        if params.status.is_some_and(|s| s != response.status) {
            continue;
        }
        items.push(response);
    }

    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .collect();

    Ok(JSend::success(Page {
        items,
        limit: params.limit,
        offset: params.offset,
        total,
    }))
}

pub async fn get_config_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<ConfigFileResponse>>, ApiError> {
    let record = load(&state, &id)?;
    Ok(JSend::success(to_response(&state, &record)?))
}

pub async fn create_config_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<ConfigFileResponse>>, ApiError> {
    let mut upload: Option<(String, bytes::Bytes)> = None;
    let mut owner_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ApiError::bad_request("file field must carry a filename"))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                upload = Some((filename, data));
            }
            "owner_id" => {
                owner_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid owner_id: {e}")))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let record = state
        .uploader
        .upload(&filename, &data, owner_id.as_deref())?;

    Ok(JSend::success(to_response(&state, &record)?))
}

pub async fn attach_parent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<AttachParentRequest>,
) -> Result<Json<JSend<ConfigFileResponse>>, ApiError> {
    if req.parent_type.trim().is_empty() || req.parent_id.trim().is_empty() {
        return Err(ApiError::bad_request(
            "parent_type and parent_id must not be empty",
        ));
    }

    let mut dependents = Vec::new();
    for (kind, names) in &req.dependencies {
        let kind = DependencyKind::parse(kind).ok_or_else(|| {
            ApiError::bad_request(format!(
                "unknown dependency kind '{kind}' (expected module, theme, config or content)"
            ))
        })?;
        dependents.extend(names.iter().map(|name| (kind, name.clone())));
    }

    let parent = ParentRef {
        entity_type: req.parent_type,
        entity_id: req.parent_id,
        field: req.parent_field,
    };
    let record = state.uploader.attach(&id, &parent, &dependents)?;

    Ok(JSend::success(to_response(&state, &record)?))
}

pub async fn detach_config_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<ConfigFileResponse>>, ApiError> {
    state.uploader.detach(&id)?;
    let record = load(&state, &id)?;
    Ok(JSend::success(to_response(&state, &record)?))
}

pub async fn delete_config_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let record = load(&state, &id)?;
    state.engine.delete(&[record], SyncMode::Normal)?;

    tracing::debug!(%id, "Deleted config file");
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

fn load(state: &AppState, id: &str) -> Result<ConfigFileRecord, ApiError> {
    state
        .db
        .get_config_file(id)?
        .ok_or_else(|| ApiError::not_found("Config file not found"))
}

fn to_response(state: &AppState, record: &ConfigFileRecord) -> Result<ConfigFileResponse, ApiError> {
    let file = state.engine.file_for(record)?.map(|f| FileInfo {
        id: f.id,
        uri: f.uri,
        mime_type: f.mime_type,
        byte_size: f.byte_size,
        status: f.status,
    });
    let status = if state.engine.has_config(record) {
        ConfigStatus::Active
    } else {
        ConfigStatus::Pending
    };
    let parent = match (&record.parent_type, &record.parent_id) {
        (Some(entity_type), Some(entity_id)) => Some(ParentResponse {
            entity_type: entity_type.clone(),
            entity_id: entity_id.clone(),
            field: record.parent_field.clone(),
        }),
        _ => None,
    };

    Ok(ConfigFileResponse {
        changed: record.changed,
        config_uri: record.config_uri(),
        dependencies: record.dependencies(),
        file,
        filename: record.filename.clone(),
        id: record.id.clone(),
        owner_id: record.owner_id.clone(),
        parent,
        status,
        uri: record.uri.clone(),
    })
}
