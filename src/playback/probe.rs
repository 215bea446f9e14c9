use anyhow::{bail, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Minimal playback surface the probe and player drive. The rodio element
/// implements it for real output; tests script it.
pub trait MediaElement: Send {
    /// Reported duration; None when the container reports unknown/infinite.
    fn duration(&self) -> Option<Duration>;

    /// Current play position.
    fn position(&self) -> Duration;

    fn seek(&mut self, position: Duration) -> Result<()>;

    fn play(&mut self) -> Result<()>;
}

/// Far beyond any plausible utterance length.
pub const FAR_SEEK: Duration = Duration::from_secs(24 * 60 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolve the true duration of a loaded element.
///
/// A finite reported duration is trusted as-is. An unknown one triggers the
/// two-phase probe: seek far past the end, wait for the play position to
/// stabilize on the real end, take that as the duration, then reset the
/// position to the start so playback begins at zero.
pub async fn resolve_duration(element: &mut dyn MediaElement) -> Result<Duration> {
    if let Some(duration) = element.duration() {
        debug!("Container reports {:.2}s; no probe needed", duration.as_secs_f64());
        return Ok(duration);
    }

    element.seek(FAR_SEEK)?;

    let mut waited = Duration::ZERO;
    let mut last_position = element.position();

    let resolved = loop {
        sleep(POLL_INTERVAL).await;
        waited += POLL_INTERVAL;

        if let Some(duration) = element.duration() {
            break duration;
        }

        let position = element.position();
        if position > Duration::ZERO && position == last_position {
            // The seek clamped to the real end of the stream.
            break position;
        }
        last_position = position;

        if waited >= PROBE_TIMEOUT {
            bail!("duration did not resolve within {:?}", PROBE_TIMEOUT);
        }
    };

    if resolved.is_zero() {
        bail!("resolved a zero duration; media is not playable");
    }

    element.seek(Duration::ZERO)?;

    debug!("Probed duration: {:.2}s", resolved.as_secs_f64());

    Ok(resolved)
}
