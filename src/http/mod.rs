//! HTTP upload server
//!
//! Persists finished recordings for remote playback:
//! - POST /upload - Store a recording (multipart field `video`)
//! - GET /history - List stored recordings
//! - DELETE /recording/:id - Delete a stored recording
//! - GET /uploads/* - Serve stored files
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;
mod storage;

pub use handlers::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use storage::UploadStore;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Bind `addr` and serve until the process is stopped
pub async fn serve(addr: &str, uploads: UploadStore) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
    info!(
        "Server running at http://{} (uploads in {})",
        listener.local_addr()?,
        uploads.dir().display()
    );

    axum::serve(listener, create_router(AppState::new(uploads)))
        .await
        .context("HTTP server failed")
}
