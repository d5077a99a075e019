use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::storage::DatabaseError;
use crate::sync::SyncError;
use crate::upload::UploadError;

// ============================================================================
// JSend envelopes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub message: String,
}

/// Client errors (4xx) carry their message under `data`, server errors (5xx) at the top level.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JSendProblem {
    Fail { data: FailData, status: JSendStatus },
    Error { message: String, status: JSendStatus },
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Fail(code, message) => (
                code,
                Json(JSendProblem::Fail {
                    data: FailData { message },
                    status: JSendStatus::Fail,
                }),
            )
                .into_response(),
            ApiError::Error(code, message) => (
                code,
                Json(JSendProblem::Error {
                    message,
                    status: JSendStatus::Error,
                }),
            )
                .into_response(),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::PAYLOAD_TOO_LARGE, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::CONFLICT, message.into())
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::UNSUPPORTED_MEDIA_TYPE, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::NoAssociatedFile(_) | SyncError::CacheMiss(_) => {
                ApiError::not_found(e.to_string())
            }
            SyncError::SourceUnreadable { .. } => ApiError::not_found("File content not found"),
            e => ApiError::internal(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::InvalidFilename(_) => ApiError::bad_request(e.to_string()),
            UploadError::ExtensionNotAllowed(_) => ApiError::unsupported_media_type(e.to_string()),
            UploadError::TooLarge(_) => ApiError::payload_too_large(e.to_string()),
            UploadError::IdConflict { .. } => ApiError::conflict(e.to_string()),
            UploadError::NotFound(_) => ApiError::not_found(e.to_string()),
            UploadError::Sync(e) => e.into(),
            e => ApiError::internal(e.to_string()),
        }
    }
}

// ============================================================================
// Custom extractors (reject with JSend-formatted ApiError)
// ============================================================================

/// Drop-in replacement for `axum::Json` that rejects with JSend errors.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(JsonRejection::JsonDataError(err)) => Err(ApiError::bad_request(format!(
                "Invalid request body: {}",
                err.body_text()
            ))),
            Err(JsonRejection::MissingJsonContentType(_)) => Err(ApiError::bad_request(
                "Missing Content-Type: application/json header",
            )),
            Err(_) => Err(ApiError::bad_request("Malformed JSON in request body")),
        }
    }
}

/// Query string extractor that rejects with JSend errors.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query)
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(format!("Invalid query parameter: {e}")))
    }
}
