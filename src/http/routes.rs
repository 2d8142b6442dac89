use super::handlers;
use super::state::AppState;
use super::storage::PUBLIC_PREFIX;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and part headers on top of the file limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.uploads.dir());
    let body_limit = state.uploads.max_bytes().saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording persistence
        .route("/upload", post(handlers::upload))
        .route("/history", get(handlers::history))
        .route("/recording/:id", delete(handlers::delete_recording))
        // Stored files
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        // Request logging outermost, then CORS for browser clients
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
