//! Catalog of finished recordings and ownership of their playback locators

mod entry;
mod format;
mod locator;
mod store;

pub use entry::{HistoryEntry, SyncStatus};
pub use format::{format_duration, format_size};
pub use locator::{Locator, LocatorTable};
pub use store::{HistoryStore, CATALOG_FILE, MEDIA_DIR};
pub(crate) use store::write_atomic;
