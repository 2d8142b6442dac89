use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::media::container_mime;

/// Download name of a recording made at `created_at`
pub fn download_name(created_at: DateTime<Utc>, extension: &str) -> String {
    format!(
        "recording-{}.{}",
        created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        extension
    )
}

/// Write `bytes` into `dir` as `name`, returning the written path
pub fn write_download(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    // ':' is not portable in file names
    let path = dir.join(name.replace(':', "-"));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// A finished recording
///
/// Fields are fixed when the artifact is built and can only be read.
#[derive(Debug, Clone)]
pub struct Artifact {
    id: String,
    created_at: DateTime<Utc>,
    duration_secs: f64,
    size: u64,
    mime_type: String,
    payload: Arc<[u8]>,
}

impl Artifact {
    pub fn new(
        payload: Vec<u8>,
        duration_secs: f64,
        mime_type: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            created_at,
            duration_secs,
            size: payload.len() as u64,
            mime_type: container_mime(mime_type).to_string(),
            payload: Arc::from(payload),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    /// File extension matching the MIME subtype ("video/webm" -> "webm")
    pub fn extension(&self) -> &str {
        self.mime_type.split('/').nth(1).unwrap_or("bin")
    }

    /// Download name, e.g. `recording-2025-10-27T14:30:00.000Z.webm`
    pub fn file_name(&self) -> String {
        download_name(self.created_at, self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metadata_is_fixed_at_creation() {
        let created = Utc.with_ymd_and_hms(2025, 10, 27, 14, 30, 0).unwrap();
        let artifact = Artifact::new(vec![1, 2, 3, 4], 2.5, "video/webm;codecs=vp9,opus", created);

        assert_eq!(artifact.size(), 4);
        assert_eq!(artifact.duration_secs(), 2.5);
        assert_eq!(artifact.mime_type(), "video/webm");
        assert_eq!(artifact.extension(), "webm");
        assert_eq!(artifact.created_at(), created);
        assert_eq!(artifact.file_name(), "recording-2025-10-27T14:30:00.000Z.webm");
    }

    #[test]
    fn test_ids_are_unique() {
        let now = Utc::now();
        let a = Artifact::new(vec![1], 1.0, "video/webm", now);
        let b = Artifact::new(vec![1], 1.0, "video/webm", now);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_write_download_strips_colons() {
        let dir = tempfile::TempDir::new().unwrap();
        let artifact = Artifact::new(b"payload".to_vec(), 1.0, "video/webm", Utc::now());

        let path = write_download(dir.path(), &artifact.file_name(), artifact.payload()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        assert!(!path.file_name().unwrap().to_string_lossy().contains(':'));
    }
}
