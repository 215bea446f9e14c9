use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let media_dir = state.media_dir.clone();

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Capture control
        .route("/capture/start", post(handlers::start_capture))
        .route("/capture/stop", post(handlers::stop_capture))
        .route("/capture/status", get(handlers::capture_status))
        // Transcript views
        .route("/transcripts", get(handlers::list_transcripts))
        // Playback
        .route("/playback", get(handlers::playback_session))
        .route("/playback/:segment_id", post(handlers::select_playback))
        // Stored segment media for the audio element
        .nest_service("/media", ServeDir::new(media_dir))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
