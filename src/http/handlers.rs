use super::state::AppState;
use crate::error::RecorderError;
use crate::remote::{ApiMessage, StoredFile, UploadResponse, UPLOAD_FIELD};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

// ============================================================================
// Errors
// ============================================================================

/// Error reply: `{success: false, message}` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiMessage::error(self.message))).into_response()
    }
}

/// Oversized and malformed bodies are both client errors
impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        warn!("Rejected multipart body: {}", error);
        Self::bad_request(format!("Invalid upload: {}", error.body_text()))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /upload
/// Store the `video` field of a multipart form
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let mimetype = field.content_type().unwrap_or_default().to_string();
        if !mimetype.starts_with("video/") {
            return Err(ApiError::bad_request("Only video files are allowed"));
        }
        let original = field.file_name().unwrap_or("recording").to_string();

        let limit = state.uploads.max_bytes();
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(ApiError::bad_request(format!(
                    "File too large: limit is {} bytes",
                    limit
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let file = state
            .uploads
            .store(&original, &mimetype, &bytes)
            .await
            .map_err(|e| {
                error!("Upload error: {}", e);
                ApiError::internal(e.to_string())
            })?;

        return Ok(Json(UploadResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            file,
        }));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// GET /history
/// List stored recordings, newest first
pub async fn history(State(state): State<AppState>) -> Result<Json<Vec<StoredFile>>, ApiError> {
    state.uploads.list().await.map(Json).map_err(|e| {
        error!("History error: {}", e);
        ApiError::internal("Failed to retrieve recording history")
    })
}

/// DELETE /recording/:id
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiMessage>, ApiError> {
    match state.uploads.delete(&id).await {
        Ok(()) => {
            info!("Recording {} deleted", id);
            Ok(Json(ApiMessage::ok("Recording deleted successfully")))
        }
        Err(RecorderError::NotFound(_)) => Err(ApiError::not_found("Recording not found")),
        Err(e) => {
            error!("Delete error: {}", e);
            Err(ApiError::internal("Failed to delete recording"))
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
