pub mod audio;
pub mod config;
pub mod http;
pub mod pipeline;
pub mod playback;
pub mod transcribe;

pub use audio::{
    AudioFrame, Classification, MicrophoneBackend, MicrophoneConfig, MicrophoneFactory, Segment,
    SegmentAssembler, SegmentId, SpectrumAnalyser,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use pipeline::{Pipeline, PipelineHandle, PipelineStatus, RecordingState};
pub use playback::{MediaElement, PlaybackView, Player};
pub use transcribe::{
    Dispatcher, HttpTranscriber, TranscribeOptions, TranscriptResult, TranscriptionService,
};
