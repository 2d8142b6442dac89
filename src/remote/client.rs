use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::messages::{ApiMessage, StoredFile, UploadResponse, UploadedFile};
use crate::error::{RecorderError, Result};

/// Multipart field the server reads the recording from
pub const UPLOAD_FIELD: &str = "video";

/// HTTP client for the upload server
#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: String,
    http: Client,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /upload
    pub async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| RecorderError::InvalidParameter(format!("bad MIME type: {}", e)))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        debug!("Uploading {} ({} bytes) to {}", file_name, size, self.base_url);
        let response = self
            .http
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let body: UploadResponse = read_json(response).await?;
        info!("Uploaded {} as {}", file_name, body.file.path);
        Ok(body.file)
    }

    /// GET /history
    pub async fn history(&self) -> Result<Vec<StoredFile>> {
        let response = self
            .http
            .get(self.url("/history"))
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    /// DELETE /recording/:id
    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/recording/{}", id)))
            .send()
            .await
            .map_err(transport_error)?;
        let body: ApiMessage = read_json(response).await?;
        info!("Remote recording {} deleted: {}", id, body.message);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(error: reqwest::Error) -> RecorderError {
    warn!("Upload server unreachable: {}", error);
    RecorderError::StorageIo(format!("upload server request failed: {}", error))
}

/// Decode a success body or map the server's error body into the taxonomy
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            RecorderError::StorageIo(format!("unexpected response from upload server: {}", e))
        });
    }

    let message = match response.json::<ApiMessage>().await {
        Ok(body) => body.message,
        Err(_) => status.to_string(),
    };
    Err(match status {
        StatusCode::BAD_REQUEST => RecorderError::UploadRejected(message),
        StatusCode::NOT_FOUND => RecorderError::NotFound(message),
        _ => RecorderError::StorageIo(format!("upload server returned {}: {}", status, message)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = UploadClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/history"), "http://localhost:8000/history");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_storage_error() {
        // Port 9 (discard) is not served on test hosts
        let client = UploadClient::new("http://127.0.0.1:9");
        let err = client.history().await.unwrap_err();
        assert!(matches!(err, RecorderError::StorageIo(_)));
    }
}
