use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::probe::{resolve_duration, MediaElement};
use crate::audio::SegmentId;

/// What the presentation layer sees of the active playback session.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackView {
    pub id: SegmentId,
    /// None until the duration probe resolves
    pub duration_secs: Option<f64>,
}

/// Plays one segment at a time.
///
/// Selecting a segment while another is playing is ignored. Sessions tear
/// themselves down: once the resolved duration elapses (or resolution
/// fails), the selection clears without any explicit stop operation.
pub struct Player {
    active: Arc<Mutex<Option<PlaybackView>>>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start playing `element` as segment `id`. Returns false when a session
    /// is already active (the select is ignored).
    pub async fn play(&self, id: SegmentId, element: Box<dyn MediaElement>) -> bool {
        {
            let mut active = self.active.lock().await;
            if active.is_some() {
                debug!("Playback busy; ignoring select for {}", id);
                return false;
            }
            *active = Some(PlaybackView {
                id,
                duration_secs: None,
            });
        }

        let slot = Arc::clone(&self.active);

        tokio::spawn(async move {
            let mut element = element;

            match resolve_duration(element.as_mut()).await {
                Ok(duration) => {
                    {
                        let mut active = slot.lock().await;
                        if let Some(view) = active.as_mut() {
                            view.duration_secs = Some(duration.as_secs_f64());
                        }
                    }

                    match element.play() {
                        Ok(()) => {
                            info!("Playing {} ({:.2}s)", id, duration.as_secs_f64());
                            // The session lives exactly as long as the audio.
                            tokio::time::sleep(duration).await;
                        }
                        Err(e) => {
                            error!("Playback of {} failed: {:#}", id, e);
                        }
                    }
                }
                Err(e) => {
                    error!("Cannot play segment {}: {:#}", id, e);
                }
            }

            *slot.lock().await = None;
        });

        true
    }

    /// Current session, if one is active.
    pub async fn session(&self) -> Option<PlaybackView> {
        self.active.lock().await.clone()
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}
