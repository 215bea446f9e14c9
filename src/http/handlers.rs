use super::state::AppState;
use crate::audio::SegmentId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::str::FromStr;
use tracing::{error, info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    pub segment_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /capture/start
/// Arm the pipeline; recording begins on the first detected sound
pub async fn start_capture(State(state): State<AppState>) -> impl IntoResponse {
    if state.pipeline.device_error() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Microphone unavailable".to_string(),
            }),
        )
            .into_response();
    }

    info!("Capture start requested");
    state.pipeline.start_intent().await;

    (
        StatusCode::OK,
        Json(CaptureResponse {
            status: "armed".to_string(),
            message: "Listening for speech".to_string(),
        }),
    )
        .into_response()
}

/// POST /capture/stop
/// Return to idle; flushes the current utterance if one is being recorded
pub async fn stop_capture(State(state): State<AppState>) -> impl IntoResponse {
    info!("Capture stop requested");
    state.pipeline.stop_intent().await;

    (
        StatusCode::OK,
        Json(CaptureResponse {
            status: "idle".to_string(),
            message: "Capture stopped".to_string(),
        }),
    )
        .into_response()
}

/// GET /capture/status
/// Recording state, busy indicator and error flag for the presentation layer
pub async fn capture_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.pipeline.status().await;
    (StatusCode::OK, Json(status)).into_response()
}

/// GET /transcripts
/// Transcript results sorted by segment identity (recording order)
pub async fn list_transcripts(State(state): State<AppState>) -> impl IntoResponse {
    let results = state.pipeline.results().await;
    (StatusCode::OK, Json(results)).into_response()
}

/// GET /playback
/// The active playback session, if any
pub async fn playback_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.player.session().await;
    (StatusCode::OK, Json(session)).into_response()
}

/// POST /playback/:segment_id
/// Select a segment for playback; ignored while another is playing
pub async fn select_playback(
    State(state): State<AppState>,
    Path(segment_id): Path<String>,
) -> impl IntoResponse {
    let id = match SegmentId::from_str(&segment_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid segment id: {segment_id}"),
                }),
            )
                .into_response();
        }
    };

    let result = match state.pipeline.result(id).await {
        Some(result) => result,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Segment {id} not found"),
                }),
            )
                .into_response();
        }
    };

    // The stored media lives in the service's media directory under the
    // final component of the URL it reported.
    let file_name = result
        .media_url
        .rsplit('/')
        .next()
        .unwrap_or(&result.media_url)
        .to_string();
    let media_path = state.media_dir.join(&file_name);

    let media = match tokio::fs::read(&media_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Cannot read media for {}: {}", id, e);
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Media for {id} not available"),
                }),
            )
                .into_response();
        }
    };

    let element = match (state.elements)(media) {
        Ok(element) => element,
        Err(e) => {
            error!("Cannot open playback element for {}: {:#}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Playback unavailable".to_string(),
                }),
            )
                .into_response();
        }
    };

    let started = state.player.play(id, element).await;
    if !started {
        warn!("Playback busy; select for {} ignored", id);
    }

    (
        StatusCode::OK,
        Json(PlaybackResponse {
            segment_id: id.to_string(),
            status: if started { "playing" } else { "busy" }.to_string(),
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
