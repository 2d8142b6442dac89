pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod media;
pub mod playback;
pub mod remote;
pub mod session;
pub mod studio;

pub use config::Config;
pub use error::{RecorderError, Result};
pub use history::{format_duration, format_size, HistoryEntry, HistoryStore, Locator, SyncStatus};
pub use http::{create_router, AppState, UploadStore};
pub use media::{
    DeviceRegistry, MediaConstraints, MediaSource, MediaSourceFactory, SourceKind, SyntheticConfig,
    SyntheticSource, TransportEvent,
};
pub use playback::{
    HeadlessSurface, PlaybackController, PlaybackFault, PlaybackSource, PlaybackState,
};
pub use remote::{UploadClient, UploadedFile};
pub use session::{
    Artifact, ChunkBuffer, RecordingSession, SessionConfig, SessionHandle, SessionState,
    SessionStats,
};
pub use studio::{Notice, NoticeLevel, Studio};
