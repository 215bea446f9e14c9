// Frequency-domain sound/silence classification
//
// Mirrors what a spectrum analyser node does for a live stream: take the most
// recent samples, transform to the frequency domain, and report whether any
// bin carries energy above the configured decibel floor. Only the latest
// frame matters; no history is kept.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// A single sound/silence judgment for one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub sound_detected: bool,
}

/// Windowed FFT analyser with a decibel floor.
///
/// A frequency bin counts as carrying sound iff its magnitude, in dBFS,
/// exceeds `min_decibels`. The classification is true iff any bin qualifies.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_size: usize,
    min_decibels: f32,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize, min_decibels: f32) -> Self {
        let fft_size = fft_size.max(2).next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window keeps spectral leakage from smearing energy across bins.
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let phase = (i as f32) / (fft_size as f32 - 1.0);
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * phase).cos()
            })
            .collect();

        Self {
            fft,
            window,
            fft_size,
            min_decibels,
        }
    }

    pub fn min_decibels(&self) -> f32 {
        self.min_decibels
    }

    /// Classify the latest interleaved PCM frame. Absent or empty frames
    /// classify as silence.
    pub fn classify(&self, samples: &[i16], channels: u16) -> Classification {
        if samples.is_empty() {
            return Classification {
                sound_detected: false,
            };
        }

        let mono = downmix(samples, channels);
        let spectrum = self.spectrum(&mono);

        let sound_detected = spectrum.iter().any(|&db| db > self.min_decibels);

        Classification { sound_detected }
    }

    /// Per-bin levels in dBFS for the latest samples (tail-aligned so the
    /// newest audio always lands in the analysis window).
    fn spectrum(&self, mono: &[f32]) -> Vec<f32> {
        let start = mono.len().saturating_sub(self.fft_size);
        let tail = &mono[start..];

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.fft_size];
        for (i, &sample) in tail.iter().enumerate() {
            buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut buffer);

        // Half-spectrum magnitudes; the window halves the coherent gain, so
        // scale by 2/N on top of the usual 2/N single-sided correction.
        let scale = 4.0 / self.fft_size as f32;
        buffer
            .iter()
            .take(self.fft_size / 2)
            .map(|c| {
                let magnitude = c.norm() * scale;
                20.0 * magnitude.max(1e-10).log10()
            })
            .collect()
    }
}

fn downmix(samples: &[i16], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    samples
        .chunks(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32_768.0).sum();
            sum / frame.len() as f32
        })
        .collect()
}
