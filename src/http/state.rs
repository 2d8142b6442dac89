use super::storage::UploadStore;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    pub fn new(uploads: UploadStore) -> Self {
        Self {
            uploads: Arc::new(uploads),
        }
    }
}
