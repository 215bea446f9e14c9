use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioSettings,
    pub capture: CaptureSettings,
    pub transcribe: TranscribeSettings,
    pub media: MediaSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSettings {
    /// Input device name (None = system default microphone)
    #[serde(default)]
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Capture buffer duration in milliseconds (affects latency)
    pub frame_duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    /// Energy floor below which a frequency bin counts as silent (dBFS)
    pub min_decibels: f32,
    /// Accumulated silence that ends an utterance (milliseconds)
    pub max_pause_ms: u64,
    /// Consecutive automatically-cut segments before recording stops itself
    pub max_auto_segments: u32,
    /// Level monitor cadence in milliseconds (~60 Hz)
    pub monitor_interval_ms: u64,
    /// FFT size for the frequency-domain analyser (power of two)
    pub fft_size: usize,
    /// Nominal utterance period shown by the presentation layer (seconds)
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeSettings {
    /// Transcription service endpoint, e.g. "http://localhost:3000/api/transcribe"
    pub endpoint: String,
    pub model: String,
    pub language: String,
    pub task: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    /// Directory where the transcription service stores segment media;
    /// served back to the presentation layer for playback
    pub media_dir: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            min_decibels: -45.0,
            max_pause_ms: 3000,
            max_auto_segments: 10,
            monitor_interval_ms: 16,
            fft_size: 2048,
            duration_secs: 5,
        }
    }
}

impl Default for TranscribeSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/transcribe".to_string(),
            model: "tiny".to_string(),
            language: "Japanese".to_string(),
            task: "translate".to_string(),
            timeout_secs: 120,
        }
    }
}
