//! Asynchronous transcription dispatch
//!
//! Segments are shipped to the transcription endpoint fire-and-forget; the
//! dispatcher tracks how many are in flight and merges whatever comes back
//! into an identity-ordered result collection, so the transcript reads in
//! recording order no matter how the network interleaves completions.

pub mod client;
pub mod dispatcher;

pub use client::{HttpTranscriber, StoredMedia, TranscribeOptions, TranscribeResponse, TranscriptionService};
pub use dispatcher::{Dispatcher, TranscriptResult};
