// Microphone capture backend using cpal
//
// cpal delivers samples on a dedicated callback thread in whatever format the
// device speaks. Everything is converted to interleaved i16 mono at the target
// rate before being handed to the session as AudioFrames.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::{AudioFrame, MicrophoneBackend, MicrophoneConfig};

const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Microphone backend
///
/// Owns a capture thread that keeps the cpal stream alive; the stream itself
/// is not Send, so it never leaves that thread.
pub struct CpalBackend {
    config: MicrophoneConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl CpalBackend {
    pub fn new(config: MicrophoneConfig) -> Result<Self> {
        info!(
            "Microphone backend initialized ({}Hz, {} channels, {}ms frames)",
            config.target_sample_rate, config.target_channels, config.frame_duration_ms
        );

        Ok(Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            capturing: false,
        })
    }

    /// List input device names so the CLI can expose a selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[async_trait::async_trait]
impl MicrophoneBackend for CpalBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        info!("Starting microphone capture");

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&self.stop_flag);
        let config = self.config.clone();

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || run_capture(config, frame_tx, ready_tx, stop_flag))
            .context("Failed to spawn capture thread")?;

        let device_name = ready_rx
            .await
            .map_err(|_| anyhow!("capture thread exited before reporting readiness"))??;

        self.thread = Some(handle);
        self.capturing = true;

        info!("Microphone capture started on '{}'", device_name);

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        info!("Stopping microphone capture");

        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Capture thread panicked during shutdown"),
                Err(e) => warn!("Failed to join capture thread: {}", e),
            }
        }

        self.capturing = false;

        info!("Microphone capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Body of the capture thread. Builds the stream, reports readiness, then
/// parks until stopped; dropping the stream flushes remaining callbacks and
/// closing the frame channel signals end-of-stream to the session.
fn run_capture(
    config: MicrophoneConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<String>>,
    stop_flag: Arc<AtomicBool>,
) {
    let built = build_stream(&config, frame_tx);

    let (stream, device_name) = match built {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(anyhow!("failed to start input stream: {e}")));
        return;
    }

    let _ = ready_tx.send(Ok(device_name));

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(25));
    }

    if let Err(e) = stream.pause() {
        warn!("Failed to pause input stream: {}", e);
    }
    drop(stream);
}

fn build_stream(
    config: &MicrophoneConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();

    let device = match &config.device {
        Some(name) => {
            let mut devices = host.input_devices().context(
                "no input devices available; check microphone permissions and availability",
            )?;
            devices
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("input device '{name}' not found"))?
        }
        None => host
            .default_input_device()
            .context("no default input device available; check microphone permissions")?,
    };

    let device_name = device
        .name()
        .unwrap_or_else(|_| "unknown input device".to_string());

    let default_config = device
        .default_input_config()
        .context("failed to query input device configuration")?;
    let format = default_config.sample_format();
    let device_config: StreamConfig = default_config.into();
    let device_sample_rate = device_config.sample_rate.0;
    let channels = usize::from(device_config.channels.max(1));

    // Integer decimation only; a 48kHz device at a 16kHz target keeps every
    // third sample. Devices already at or below the target pass through.
    let ratio = (device_sample_rate / config.target_sample_rate).max(1);
    let effective_rate = device_sample_rate / ratio;

    info!(
        "Input device '{}': format={:?} rate={}Hz channels={} (emitting {}Hz mono)",
        device_name, format, device_sample_rate, channels, effective_rate
    );

    let frame_samples =
        ((u64::from(effective_rate) * config.frame_duration_ms) / 1000).max(1) as usize;

    let mut slicer = FrameSlicer::new(frame_samples, effective_rate, ratio as usize, frame_tx);

    let err_fn = |err| warn!("Audio stream error: {}", err);

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &device_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                slicer.push(data, channels, |s| {
                    (s * 32767.0).clamp(-32768.0, 32767.0) as i16
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &device_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                slicer.push(data, channels, |s| s);
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &device_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                slicer.push(data, channels, |s| (i32::from(s) - 32_768) as i16);
            },
            err_fn,
            None,
        )?,
        other => bail!("unsupported sample format: {other:?}"),
    };

    Ok((stream, device_name))
}

/// Accumulates converted mono samples on the callback thread and emits fixed
/// duration AudioFrames. try_send keeps the audio callback non-blocking; full
/// channels drop the frame and count it.
struct FrameSlicer {
    frame_samples: usize,
    sample_rate: u32,
    decim_ratio: usize,
    decim_phase: usize,
    pending: Vec<i16>,
    samples_emitted: u64,
    dropped: Arc<AtomicUsize>,
    tx: mpsc::Sender<AudioFrame>,
}

impl FrameSlicer {
    fn new(
        frame_samples: usize,
        sample_rate: u32,
        decim_ratio: usize,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            sample_rate,
            decim_ratio: decim_ratio.max(1),
            decim_phase: 0,
            pending: Vec::with_capacity(frame_samples),
            samples_emitted: 0,
            dropped: Arc::new(AtomicUsize::new(0)),
            tx,
        }
    }

    fn push<T, F>(&mut self, data: &[T], channels: usize, mut convert: F)
    where
        T: Copy,
        F: FnMut(T) -> i16,
    {
        // Average interleaved channels down to mono, then decimate.
        let channels = channels.max(1);
        for frame in data.chunks(channels) {
            let mut acc = 0i32;
            for &sample in frame {
                acc += i32::from(convert(sample));
            }
            let mono = (acc / frame.len() as i32) as i16;

            if self.decim_phase == 0 {
                self.pending.push(mono);
            }
            self.decim_phase = (self.decim_phase + 1) % self.decim_ratio;
        }

        while self.pending.len() >= self.frame_samples {
            let samples: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            let timestamp_ms = self.samples_emitted * 1000 / u64::from(self.sample_rate);
            self.samples_emitted += samples.len() as u64;

            let frame = AudioFrame {
                samples,
                sample_rate: self.sample_rate,
                channels: 1,
                timestamp_ms,
            };

            if let Err(err) = self.tx.try_send(frame) {
                match err {
                    mpsc::error::TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    mpsc::error::TrySendError::Closed(_) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slicer_with_channel(
        frame_samples: usize,
        ratio: usize,
    ) -> (FrameSlicer, mpsc::Receiver<AudioFrame>) {
        let (tx, rx) = mpsc::channel(8);
        (FrameSlicer::new(frame_samples, 16000, ratio, tx), rx)
    }

    #[test]
    fn slicer_emits_fixed_size_frames() {
        let (mut slicer, mut rx) = slicer_with_channel(4, 1);

        slicer.push(&[1i16, 2, 3, 4, 5, 6, 7, 8, 9], 1, |s| s);

        let first = rx.try_recv().expect("first frame");
        let second = rx.try_recv().expect("second frame");
        assert_eq!(first.samples, vec![1, 2, 3, 4]);
        assert_eq!(second.samples, vec![5, 6, 7, 8]);
        assert!(rx.try_recv().is_err(), "ninth sample stays pending");
    }

    #[test]
    fn slicer_downmixes_stereo_to_mono() {
        let (mut slicer, mut rx) = slicer_with_channel(2, 1);

        // Interleaved stereo pairs average to (150, 350).
        slicer.push(&[100i16, 200, 300, 400], 2, |s| s);

        let frame = rx.try_recv().expect("frame");
        assert_eq!(frame.samples, vec![150, 350]);
        assert_eq!(frame.channels, 1);
    }

    #[test]
    fn slicer_decimates_by_ratio() {
        let (mut slicer, mut rx) = slicer_with_channel(3, 3);

        slicer.push(&[10i16, 20, 30, 40, 50, 60, 70, 80, 90], 1, |s| s);

        let frame = rx.try_recv().expect("frame");
        assert_eq!(frame.samples, vec![10, 40, 70]);
    }

    #[test]
    fn slicer_timestamps_advance_with_emitted_samples() {
        let (mut slicer, mut rx) = slicer_with_channel(16000, 1);

        slicer.push(&vec![0i16; 32000], 1, |s| s);

        let first = rx.try_recv().expect("first frame");
        let second = rx.try_recv().expect("second frame");
        assert_eq!(first.timestamp_ms, 0);
        assert_eq!(second.timestamp_ms, 1000);
    }
}
