//! HTTP API for the presentation layer
//!
//! The page talks to the pipeline exclusively through this surface:
//! - POST /capture/start - start listening for utterances
//! - POST /capture/stop - stop listening
//! - GET /capture/status - recording state, busy indicator, error flag
//! - GET /transcripts - transcript results in recording order
//! - POST /playback/:segment_id - select a segment for playback
//! - GET /playback - active playback session, if any
//! - GET /media/* - stored segment media
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, ElementFactory};
