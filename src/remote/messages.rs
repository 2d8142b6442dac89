//! JSON bodies exchanged with the upload server

use serde::{Deserialize, Serialize};

/// Metadata of a freshly stored upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// File stem, used as the delete key
    pub id: String,
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
    /// Public path under `/uploads`
    pub path: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// `POST /upload` success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file: UploadedFile,
}

/// One element of `GET /history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Status body used for deletes and every error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_field_names() {
        let json = r#"{
            "success": true,
            "message": "File uploaded successfully",
            "file": {
                "id": "recording-1730000000000-42",
                "filename": "recording-1730000000000-42.webm",
                "originalname": "clip.webm",
                "mimetype": "video/webm",
                "size": 2048,
                "path": "/uploads/recording-1730000000000-42.webm",
                "timestamp": 1730000000000
            }
        }"#;

        let response: UploadResponse = serde_json::from_str(json).unwrap();
        assert!(response.success);
        assert_eq!(response.file.id, "recording-1730000000000-42");
        assert_eq!(response.file.originalname, "clip.webm");
        assert_eq!(response.file.size, 2048);
    }

    #[test]
    fn test_error_message_shape() {
        let value = serde_json::to_value(ApiMessage::error("Recording not found")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"success": false, "message": "Recording not found"})
        );
    }
}
