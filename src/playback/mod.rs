//! Segment playback
//!
//! Streamed recordings land in containers that report an unknown duration,
//! which breaks both seeking and the timer that ends a playback session. The
//! probe resolves the real duration first (one far-forward seek, read back
//! the corrected value, reset); only then does audio start.

pub mod element;
pub mod player;
pub mod probe;

pub use element::{AudioOutput, RodioElement};
pub use player::{PlaybackView, Player};
pub use probe::{resolve_duration, MediaElement, FAR_SEEK};
