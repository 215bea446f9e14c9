use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::{TranscribeOptions, TranscriptionService};
use crate::audio::{Segment, SegmentId};

/// One successfully transcribed segment.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResult {
    pub id: SegmentId,
    /// Transcript lines in the order the service produced them
    pub texts: Vec<String>,
    /// URL the presentation layer can play the stored media from
    pub media_url: String,
}

/// Fire-and-forget transcription dispatch.
///
/// Every dispatch spawns its own task; nothing gates how many are in flight.
/// Results land in a map ordered by segment identity, which is what restores
/// chronological order for display when responses arrive out of order.
#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn TranscriptionService>,
    options: TranscribeOptions,
    cancel: CancellationToken,
    shared: Arc<Shared>,
}

struct Shared {
    in_flight: AtomicUsize,
    results: Mutex<BTreeMap<SegmentId, TranscriptResult>>,
}

impl Dispatcher {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        options: TranscribeOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            options,
            cancel,
            shared: Arc::new(Shared {
                in_flight: AtomicUsize::new(0),
                results: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Send a segment for transcription. Returns immediately; the outcome
    /// only ever shows up as a new result (success) or a warn log (anything
    /// else). Failed segments are dropped, never retried.
    pub fn dispatch(&self, segment: Segment) {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);

        let service = Arc::clone(&self.service);
        let options = self.options.clone();
        let cancel = self.cancel.clone();
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                resp = service.transcribe(&segment, &options) => Some(resp),
            };

            match outcome {
                Some(Ok(resp)) if resp.status == 200 => {
                    let texts = split_lines(&resp.out);
                    match (texts.is_empty(), resp.file) {
                        (false, Some(file)) => {
                            let result = TranscriptResult {
                                id: segment.id,
                                texts,
                                media_url: media_url(&file.path),
                            };
                            let mut results = shared.results.lock().await;
                            results.insert(segment.id, result);
                            debug!("Transcript for {} merged ({} total)", segment.id, results.len());
                        }
                        (true, _) => {
                            warn!("Segment {} produced an empty transcript; dropped", segment.id);
                        }
                        (false, None) => {
                            warn!(
                                "Transcription response for {} carries no stored media; dropped",
                                segment.id
                            );
                        }
                    }
                }
                Some(Ok(resp)) => {
                    warn!(
                        "Transcription of {} rejected with status {}; dropped",
                        segment.id, resp.status
                    );
                }
                Some(Err(e)) => {
                    warn!("Transcription of {} failed: {:#}; dropped", segment.id, e);
                }
                None => {
                    debug!("Transcription of {} cancelled", segment.id);
                }
            }

            saturating_decrement(&shared.in_flight);
        });
    }

    /// Number of segments dispatched but not yet resolved. Informational
    /// only; never gates dispatching.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of all results, ordered by segment identity ascending.
    pub async fn results(&self) -> Vec<TranscriptResult> {
        let results = self.shared.results.lock().await;
        results.values().cloned().collect()
    }

    pub async fn result(&self, id: SegmentId) -> Option<TranscriptResult> {
        let results = self.shared.results.lock().await;
        results.get(&id).cloned()
    }

    pub async fn result_count(&self) -> usize {
        let results = self.shared.results.lock().await;
        results.len()
    }
}

/// Transcript text arrives newline-separated; blank lines carry nothing.
fn split_lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// The service reports where it stored the upload relative to its own
/// public root; strip that root to get a servable URL.
fn media_url(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("public/") {
        format!("/{rest}")
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Decrement clamped at zero; a stray extra resolution must never drive the
/// busy indicator negative.
fn saturating_decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
        Some(n.saturating_sub(1))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_drops_blank_lines() {
        assert_eq!(split_lines("hello\nworld"), vec!["hello", "world"]);
        assert_eq!(split_lines("hello\n\n  \nworld\n"), vec!["hello", "world"]);
        assert!(split_lines("").is_empty());
        assert!(split_lines("\n\n").is_empty());
    }

    #[test]
    fn media_url_strips_public_root() {
        assert_eq!(media_url("public/uploads/seg-1-0000.wav"), "/uploads/seg-1-0000.wav");
        assert_eq!(media_url("/uploads/seg-1-0000.wav"), "/uploads/seg-1-0000.wav");
        assert_eq!(media_url("uploads/seg-1-0000.wav"), "/uploads/seg-1-0000.wav");
    }

    #[test]
    fn decrement_clamps_at_zero() {
        let counter = AtomicUsize::new(2);
        for _ in 0..5 {
            saturating_decrement(&counter);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
