use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::PipelineHandle;
use crate::playback::{MediaElement, Player};

/// Builds a playback element from raw media bytes. Injected so tests can
/// swap the real audio output for a scripted element.
pub type ElementFactory = Arc<dyn Fn(Vec<u8>) -> Result<Box<dyn MediaElement>> + Send + Sync>;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineHandle,
    pub player: Arc<Player>,
    pub elements: ElementFactory,
    /// Directory where the transcription service stores segment media
    pub media_dir: PathBuf,
}

impl AppState {
    pub fn new(
        pipeline: PipelineHandle,
        player: Arc<Player>,
        elements: ElementFactory,
        media_dir: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            player,
            elements,
            media_dir,
        }
    }
}
