// Integration tests for the playback duration probe and player
//
// A scripted media element mimics both well-behaved containers and the
// streamed-recording case where the container claims an unknown duration
// until a seek past the end forces it to learn the real one.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use voicegraph::audio::SegmentId;
use voicegraph::playback::{resolve_duration, MediaElement, Player};

#[derive(Default)]
struct ElementStats {
    far_seeks: AtomicUsize,
    played: AtomicBool,
}

struct FakeElement {
    reported: Option<Duration>,
    true_duration: Duration,
    position: Duration,
    /// When false, seeking past the end teaches the element nothing and the
    /// position stays put, so the probe can never resolve.
    resolvable: bool,
    stats: Arc<ElementStats>,
}

impl FakeElement {
    fn finite(duration: Duration, stats: Arc<ElementStats>) -> Self {
        Self {
            reported: Some(duration),
            true_duration: duration,
            position: Duration::ZERO,
            resolvable: true,
            stats,
        }
    }

    fn streamed(true_duration: Duration, stats: Arc<ElementStats>) -> Self {
        Self {
            reported: None,
            true_duration,
            position: Duration::ZERO,
            resolvable: true,
            stats,
        }
    }

    fn broken(stats: Arc<ElementStats>) -> Self {
        Self {
            reported: None,
            true_duration: Duration::from_secs(1),
            position: Duration::ZERO,
            resolvable: false,
            stats,
        }
    }
}

impl MediaElement for FakeElement {
    fn duration(&self) -> Option<Duration> {
        self.reported
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if position > self.true_duration {
            self.stats.far_seeks.fetch_add(1, Ordering::SeqCst);
            if self.resolvable {
                // Seeking past the end clamps and exposes the real length.
                self.position = self.true_duration;
                self.reported = Some(self.true_duration);
            }
            return Ok(());
        }
        self.position = position;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if !self.resolvable {
            bail!("unplayable media");
        }
        self.stats.played.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn id(n: u64) -> SegmentId {
    SegmentId {
        timestamp_ms: 1000 + n,
        seq: n,
    }
}

#[tokio::test(start_paused = true)]
async fn finite_duration_plays_without_probing() -> Result<()> {
    let stats = Arc::new(ElementStats::default());
    let mut element = FakeElement::finite(Duration::from_secs(3), Arc::clone(&stats));

    let duration = resolve_duration(&mut element).await?;

    assert_eq!(duration, Duration::from_secs(3));
    assert_eq!(stats.far_seeks.load(Ordering::SeqCst), 0, "no probe seek");
    assert_eq!(element.position(), Duration::ZERO);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unknown_duration_probes_with_exactly_one_far_seek() -> Result<()> {
    let stats = Arc::new(ElementStats::default());
    let mut element = FakeElement::streamed(Duration::from_secs(2), Arc::clone(&stats));

    let duration = resolve_duration(&mut element).await?;

    assert_eq!(duration, Duration::from_secs(2));
    assert_eq!(stats.far_seeks.load(Ordering::SeqCst), 1);
    assert_eq!(element.position(), Duration::ZERO, "position reset before play");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unresolvable_duration_is_an_error() {
    let stats = Arc::new(ElementStats::default());
    let mut element = FakeElement::broken(Arc::clone(&stats));

    let result = resolve_duration(&mut element).await;
    assert!(result.is_err());
}

async fn wait_for_session_clear(player: &Player) {
    for _ in 0..500 {
        if player.session().await.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("playback session never cleared");
}

#[tokio::test(start_paused = true)]
async fn at_most_one_playback_session() {
    let player = Player::new();
    let stats = Arc::new(ElementStats::default());

    let first = FakeElement::finite(Duration::from_secs(5), Arc::clone(&stats));
    assert!(player.play(id(1), Box::new(first)).await);

    // Second select while the first is active is a no-op.
    let second_stats = Arc::new(ElementStats::default());
    let second = FakeElement::finite(Duration::from_secs(5), Arc::clone(&second_stats));
    assert!(!player.play(id(2), Box::new(second)).await);

    let session = player.session().await.expect("first session active");
    assert_eq!(session.id, id(1));
    assert!(!second_stats.played.load(Ordering::SeqCst));

    wait_for_session_clear(&player).await;
}

#[tokio::test(start_paused = true)]
async fn session_tears_down_after_resolved_duration() {
    let player = Player::new();
    let stats = Arc::new(ElementStats::default());

    let element = FakeElement::streamed(Duration::from_millis(500), Arc::clone(&stats));
    assert!(player.play(id(1), Box::new(element)).await);

    wait_for_session_clear(&player).await;
    assert!(stats.played.load(Ordering::SeqCst), "audio actually started");

    // A new select is accepted once the previous session is gone.
    let next_stats = Arc::new(ElementStats::default());
    let next = FakeElement::finite(Duration::from_millis(100), Arc::clone(&next_stats));
    assert!(player.play(id(2), Box::new(next)).await);
}

#[tokio::test(start_paused = true)]
async fn failed_resolution_clears_the_selection() {
    let player = Player::new();
    let stats = Arc::new(ElementStats::default());

    let element = FakeElement::broken(Arc::clone(&stats));
    assert!(player.play(id(1), Box::new(element)).await);

    wait_for_session_clear(&player).await;
    assert!(!stats.played.load(Ordering::SeqCst), "playback aborted");
}
