use anyhow::{anyhow, Context, Result};
use rodio::source::Source;
use rodio::{OutputStreamHandle, Sink};
use std::io::Cursor;
use std::time::Duration;
use tracing::info;

use super::probe::MediaElement;

/// Default audio output device.
///
/// The rodio OutputStream is not Send, so a dedicated thread owns it and
/// parks until the output is dropped; the handle it hands back is freely
/// shareable and is all the elements need.
pub struct AudioOutput {
    handle: OutputStreamHandle,
    shutdown: Option<std::sync::mpsc::Sender<()>>,
}

impl AudioOutput {
    pub fn open() -> Result<Self> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match rodio::OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Keep the stream alive until AudioOutput drops.
                    let _stream = stream;
                    let _ = shutdown_rx.recv();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(anyhow!("failed to open output device: {e}")));
                }
            })
            .context("Failed to spawn audio output thread")?;

        let handle = ready_rx
            .recv()
            .context("Audio output thread exited before reporting readiness")??;

        info!("Audio output opened");

        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
        })
    }

    /// Load segment media into a playable element, paused at the start.
    pub fn element(&self, media: Vec<u8>) -> Result<RodioElement> {
        RodioElement::new(&self.handle, media)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Dropping the sender unparks the output thread.
        self.shutdown.take();
    }
}

/// rodio-backed playback element.
pub struct RodioElement {
    sink: Sink,
    total: Option<Duration>,
}

impl RodioElement {
    pub fn new(handle: &OutputStreamHandle, media: Vec<u8>) -> Result<Self> {
        let decoder =
            rodio::Decoder::new(Cursor::new(media)).context("Failed to decode segment media")?;

        // Streamed containers come back as None here; the probe handles it.
        let total = decoder.total_duration();

        let sink = Sink::try_new(handle).context("Failed to create playback sink")?;
        sink.pause();
        sink.append(decoder);

        Ok(Self { sink, total })
    }
}

impl MediaElement for RodioElement {
    fn duration(&self) -> Option<Duration> {
        self.total
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.sink
            .try_seek(position)
            .map_err(|e| anyhow!("seek failed: {e}"))
    }

    fn play(&mut self) -> Result<()> {
        self.sink.play();
        Ok(())
    }
}
