use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::entry::{HistoryEntry, SyncStatus};
use super::locator::{Locator, LocatorTable};
use crate::error::{RecorderError, Result};
use crate::playback::PlaybackMedia;
use crate::session::Artifact;

pub const CATALOG_FILE: &str = "catalog.json";
pub const MEDIA_DIR: &str = "media";

/// Catalog of finished recordings
///
/// Entries are kept most recent first. Every mutation is written through to
/// `catalog.json` before it becomes visible, and the store is the only owner
/// of the memory locators handed out for playback.
pub struct HistoryStore {
    /// None for a store without persistence
    dir: Option<PathBuf>,
    entries: Vec<HistoryEntry>,
    locators: LocatorTable,
}

impl HistoryStore {
    /// Open (or create) a catalog rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(dir.join(MEDIA_DIR))?;

        let catalog = dir.join(CATALOG_FILE);
        let stored: Vec<HistoryEntry> = match std::fs::read(&catalog) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut locators = LocatorTable::new();
        let mut entries = Vec::with_capacity(stored.len());
        for mut entry in stored {
            let media = media_path(&dir, &entry);
            match std::fs::read(&media) {
                Ok(bytes) => {
                    entry.locator = Some(locators.mint(Arc::from(bytes)));
                }
                Err(_) => match &entry.sync {
                    SyncStatus::Synced { path, .. } => {
                        entry.locator = Some(Locator::remote(path.clone()));
                    }
                    _ => {
                        warn!(
                            "Payload for history entry {} missing at {}, skipping",
                            entry.id,
                            media.display()
                        );
                        continue;
                    }
                },
            }
            entries.push(entry);
        }
        // Stable: same-millisecond entries keep their catalog order
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        info!(
            "Opened history at {} ({} entries)",
            dir.display(),
            entries.len()
        );

        Ok(Self {
            dir: Some(dir),
            entries,
            locators,
        })
    }

    /// A catalog that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            entries: Vec::new(),
            locators: LocatorTable::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Catalog `artifact` and return the new entry id
    pub fn add(&mut self, artifact: &Artifact) -> Result<String> {
        let id = self.next_id(artifact.created_at().timestamp_millis());
        let locator = self.locators.mint(artifact.payload().clone());

        let entry = HistoryEntry {
            id: id.clone(),
            artifact_id: artifact.id().to_string(),
            timestamp: artifact.created_at(),
            duration_secs: artifact.duration_secs(),
            size: artifact.size(),
            mime_type: artifact.mime_type().to_string(),
            sync: SyncStatus::LocalOnly,
            locator: Some(locator.clone()),
        };

        let media = self.dir.as_ref().map(|dir| media_path(dir, &entry));
        if let (Some(dir), Some(media)) = (&self.dir, &media) {
            if let Err(e) = write_atomic(dir.join(MEDIA_DIR).as_path(), media, artifact.payload()) {
                self.locators.revoke(&locator);
                return Err(e);
            }
        }

        let position = self
            .entries
            .iter()
            .position(|existing| existing.timestamp <= entry.timestamp)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);

        if let Err(e) = self.persist(&self.entries) {
            warn!("Failed to catalog recording {}: {}", id, e);
            self.entries.remove(position);
            self.locators.revoke(&locator);
            if let Some(media) = media {
                let _ = std::fs::remove_file(media);
            }
            return Err(e);
        }

        info!(
            "Recording {} added to history ({} bytes)",
            id,
            artifact.size()
        );
        Ok(id)
    }

    /// Entries, most recent first
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Media for a single play call
    pub fn open_media(&self, id: &str) -> Result<PlaybackMedia> {
        let entry = self.require(id)?;
        let locator = entry
            .locator
            .clone()
            .ok_or_else(|| RecorderError::NotFound(format!("recording {} has no locator", id)))?;

        Ok(PlaybackMedia {
            payload: self.locators.resolve(&locator),
            locator,
            mime_type: entry.mime_type.clone(),
            duration_secs: entry.duration_secs,
        })
    }

    /// Bytes held locally for `id`
    pub fn payload(&self, id: &str) -> Result<Arc<[u8]>> {
        let entry = self.require(id)?;
        entry
            .locator
            .as_ref()
            .and_then(|locator| self.locators.resolve(locator))
            .ok_or_else(|| RecorderError::NotFound(format!("recording {} is not held locally", id)))
    }

    /// Drop an entry
    ///
    /// The shortened catalog is written first, then the locator is revoked,
    /// then the record goes away. A failed write leaves the entry in place.
    pub fn remove(&mut self, id: &str) -> Result<HistoryEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| RecorderError::NotFound(format!("recording {}", id)))?;

        let remaining: Vec<HistoryEntry> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, entry)| entry.clone())
            .collect();
        self.persist(&remaining)?;

        if let Some(locator) = &self.entries[index].locator {
            self.locators.revoke(locator);
        }
        let entry = self.entries.remove(index);

        if let Some(dir) = &self.dir {
            let media = media_path(dir, &entry);
            if let Err(e) = std::fs::remove_file(&media) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to delete {}: {}", media.display(), e);
                }
            }
        }

        info!("Recording {} removed from history", id);
        Ok(entry)
    }

    /// Record a successful upload
    pub fn mark_synced(&mut self, id: &str, remote_id: &str, path: &str) -> Result<()> {
        self.set_sync(
            id,
            SyncStatus::Synced {
                remote_id: remote_id.to_string(),
                path: path.to_string(),
            },
        )
    }

    /// Record a failed upload
    pub fn mark_pending(&mut self, id: &str, reason: &str) -> Result<()> {
        self.set_sync(
            id,
            SyncStatus::PendingSync {
                reason: reason.to_string(),
            },
        )
    }

    /// Entries whose upload failed
    pub fn pending_sync(&self) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.sync, SyncStatus::PendingSync { .. }))
            .collect()
    }

    /// Locators released so far
    pub fn revocations(&self) -> usize {
        self.locators.revocations()
    }

    /// Whether `locator` still resolves to bytes
    pub fn is_live(&self, locator: &Locator) -> bool {
        self.locators.resolve(locator).is_some()
    }

    /// Revoke every outstanding locator; the catalog on disk is kept
    pub fn close(&mut self) -> usize {
        let released = self.locators.revoke_all();
        for entry in &mut self.entries {
            if entry.locator.as_ref().is_some_and(Locator::is_temporary) {
                entry.locator = None;
            }
        }
        debug!("History closed, {} locators revoked", released);
        released
    }

    fn require(&self, id: &str) -> Result<&HistoryEntry> {
        self.get(id)
            .ok_or_else(|| RecorderError::NotFound(format!("recording {}", id)))
    }

    fn set_sync(&mut self, id: &str, sync: SyncStatus) -> Result<()> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| RecorderError::NotFound(format!("recording {}", id)))?;

        let previous = std::mem::replace(&mut self.entries[index].sync, sync);
        if let Err(e) = self.persist(&self.entries) {
            self.entries[index].sync = previous;
            return Err(e);
        }
        Ok(())
    }

    fn next_id(&self, millis: i64) -> String {
        let base = millis.to_string();
        if self.get(&base).is_none() {
            return base;
        }
        (1..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or(base)
    }

    fn persist(&self, entries: &[HistoryEntry]) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(entries)?;
        write_atomic(dir, &dir.join(CATALOG_FILE), &json)?;
        debug!("Catalog written ({} entries)", entries.len());
        Ok(())
    }
}

fn media_path(dir: &Path, entry: &HistoryEntry) -> PathBuf {
    dir.join(MEDIA_DIR)
        .join(format!("{}.{}", entry.id, entry.extension()))
}

/// Replace `path` with `bytes` through a temp file in `dir`
pub(crate) fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn artifact_at(millis: i64) -> Artifact {
        let created = Utc.timestamp_millis_opt(millis).unwrap();
        Artifact::new(vec![1, 2, 3], 3.0, "video/webm", created)
    }

    #[test]
    fn test_same_millisecond_ids_are_disambiguated() {
        let mut store = HistoryStore::in_memory();
        let first = store.add(&artifact_at(1_700_000_000_000)).unwrap();
        let second = store.add(&artifact_at(1_700_000_000_000)).unwrap();
        let third = store.add(&artifact_at(1_700_000_000_000)).unwrap();

        assert_eq!(first, "1700000000000");
        assert_eq!(second, "1700000000000-1");
        assert_eq!(third, "1700000000000-2");
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let mut store = HistoryStore::in_memory();
        store.add(&artifact_at(1_000)).unwrap();
        store.add(&artifact_at(3_000)).unwrap();
        store.add(&artifact_at(2_000)).unwrap();

        let ids: Vec<&str> = store.list().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3000", "2000", "1000"]);
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let mut store = HistoryStore::in_memory();
        assert!(matches!(
            store.remove("nope"),
            Err(RecorderError::NotFound(_))
        ));
        assert_eq!(store.revocations(), 0);
    }

    #[test]
    fn test_failed_catalog_write_keeps_entry() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut store = HistoryStore::open(temp.path()).unwrap();
        let id = store.add(&artifact_at(5_000)).unwrap();

        // A directory in place of the catalog makes the rename fail
        std::fs::remove_file(temp.path().join(CATALOG_FILE)).unwrap();
        std::fs::create_dir(temp.path().join(CATALOG_FILE)).unwrap();

        assert!(matches!(store.remove(&id), Err(RecorderError::StorageIo(_))));
        assert!(store.get(&id).is_some());
        assert_eq!(store.revocations(), 0);
    }
}
