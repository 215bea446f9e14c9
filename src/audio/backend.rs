use anyhow::Result;
use tokio::sync::mpsc;

/// One buffer of captured audio (interleaved i16 PCM).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved PCM samples
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for microphone capture
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    /// Input device name (None = system default)
    pub device: Option<String>,
    /// Target sample rate (will decimate if the device rate is higher)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub frame_duration_ms: u64,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            device: None,
            target_sample_rate: 16000, // 16kHz, what transcription backends expect
            target_channels: 1,        // Mono
            frame_duration_ms: 100,    // 100ms buffers
        }
    }
}

/// Microphone capture backend trait
///
/// The cpal implementation covers every desktop platform; the trait exists so
/// sessions and tests can run against scripted frame sources.
#[async_trait::async_trait]
pub trait MicrophoneBackend: Send + Sync {
    /// Begin capture and return the frame channel. The backend delivers all
    /// buffered frames before `stop` resolves.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// End capture and release the device.
    async fn stop(&mut self) -> Result<()>;

    /// Whether the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Microphone backend factory
pub struct MicrophoneFactory;

impl MicrophoneFactory {
    /// Create the platform microphone backend
    pub fn create(config: MicrophoneConfig) -> Result<Box<dyn MicrophoneBackend>> {
        let backend = super::mic::CpalBackend::new(config)?;
        Ok(Box::new(backend))
    }
}
