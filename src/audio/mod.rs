pub mod backend;
pub mod level;
pub mod mic;
pub mod segment;

pub use backend::{AudioFrame, MicrophoneBackend, MicrophoneConfig, MicrophoneFactory};
pub use level::{Classification, SpectrumAnalyser};
pub use segment::{Segment, SegmentAssembler, SegmentId};
