use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{RecorderError, Result};
use crate::history::write_atomic;
use crate::remote::{StoredFile, UploadedFile};

/// Prefix of every stored upload
pub const STORED_PREFIX: &str = "recording-";

/// Public mount point of the uploads directory
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Directory of uploaded recordings
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Write an upload under a fresh `recording-<ms>-<n><ext>` name
    pub async fn store(&self, original: &str, mime_type: &str, bytes: &[u8]) -> Result<UploadedFile> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let timestamp = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
        let extension = Path::new(original)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let filename = format!("{}{}-{}{}", STORED_PREFIX, timestamp, suffix, extension);

        // Temp file beside the target, renamed once complete
        let dir = self.dir.clone();
        let path = self.dir.join(&filename);
        let payload = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &payload))
            .await
            .map_err(|e| RecorderError::StorageIo(format!("upload write task failed: {}", e)))??;
        info!("Stored upload {} ({} bytes)", filename, bytes.len());

        Ok(UploadedFile {
            id: stem(&filename).to_string(),
            path: format!("{}/{}", PUBLIC_PREFIX, filename),
            filename,
            originalname: original.to_string(),
            mimetype: mime_type.to_string(),
            size: bytes.len() as u64,
            timestamp,
        })
    }

    /// Stored recordings, newest first by modification time
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let Ok(filename) = item.file_name().into_string() else {
                continue;
            };
            if !filename.starts_with(STORED_PREFIX) {
                continue;
            }
            let metadata = item.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let timestamp = metadata
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default();

            files.push(StoredFile {
                id: stem(&filename).to_string(),
                path: format!("{}/{}", PUBLIC_PREFIX, filename),
                size: metadata.len(),
                filename,
                timestamp,
            });
        }

        files.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(files)
    }

    /// Delete the stored file whose stem is `id`
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self
            .resolve(id)
            .await?
            .ok_or_else(|| RecorderError::NotFound(format!("recording {}", id)))?;
        tokio::fs::remove_file(&path).await?;
        info!("Deleted upload {}", path.display());
        Ok(())
    }

    async fn resolve(&self, id: &str) -> Result<Option<PathBuf>> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            debug!("Rejected upload id {:?}", id);
            return Ok(None);
        }

        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(STORED_PREFIX) && stem(name) == id);
            if matches {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

/// File name without its final extension
fn stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    }
}
