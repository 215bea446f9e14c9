// Utterance segment packaging
//
// The assembler owns the pending chunk buffer: frames accumulate between
// recorder start and stop, and each stop packages whatever accumulated into
// one immutable WAV segment.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use tracing::info;

use super::backend::AudioFrame;

/// Identity of one packaged utterance.
///
/// Creation-time milliseconds joined with a process-monotonic sequence
/// number, so identities stay unique and ordered even when two segments are
/// cut within the same clock millisecond. Derived ordering is (millis, seq),
/// which is creation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SegmentId {
    pub timestamp_ms: u64,
    pub seq: u64,
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg-{}-{:04}", self.timestamp_ms, self.seq)
    }
}

impl FromStr for SegmentId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("seg-")
            .with_context(|| format!("invalid segment id: {s}"))?;
        let (millis, seq) = rest
            .split_once('-')
            .with_context(|| format!("invalid segment id: {s}"))?;
        Ok(Self {
            timestamp_ms: millis.parse()?,
            seq: seq.parse()?,
        })
    }
}

/// One packaged utterance: identity, WAV bytes, creation time.
/// Never mutated after packaging.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    pub wav: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.id)
    }
}

/// Accumulates raw frames between recorder start and stop and packages them
/// into segments.
pub struct SegmentAssembler {
    sample_rate: u32,
    channels: u16,
    pending: Vec<AudioFrame>,
    next_seq: u64,
}

impl SegmentAssembler {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Append a raw frame to the pending buffer. No validation, no size
    /// bound; the buffer lives only as long as one utterance. The packaged
    /// WAV adopts whatever format the frames carry.
    pub fn on_chunk(&mut self, frame: AudioFrame) {
        self.sample_rate = frame.sample_rate;
        self.channels = frame.channels;
        self.pending.push(frame);
    }

    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Package everything accumulated since the last stop into one segment
    /// and reset the buffer. An empty buffer still yields a (header-only)
    /// segment.
    pub fn on_recorder_stop(&mut self) -> Result<Segment> {
        let created_at = Utc::now();
        let id = SegmentId {
            timestamp_ms: created_at.timestamp_millis().max(0) as u64,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let frames = std::mem::take(&mut self.pending);
        let sample_count: usize = frames.iter().map(|f| f.samples.len()).sum();

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV writer")?;
            for frame in &frames {
                for &sample in &frame.samples {
                    writer
                        .write_sample(sample)
                        .context("Failed to write sample to WAV")?;
                }
            }
            writer.finalize().context("Failed to finalize WAV")?;
        }

        info!(
            "Packaged segment {} ({} samples, {} bytes)",
            id,
            sample_count,
            cursor.get_ref().len()
        );

        Ok(Segment {
            id,
            wav: cursor.into_inner(),
            created_at,
        })
    }
}
