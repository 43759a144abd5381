use serde::{Deserialize, Serialize};

use crate::{config::EstimationConfig, timing, Analysis};

/// Mono PCM handed over by a source that permits raw audio access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Slice covering `[offset, offset + length)` seconds, clamped to the
    /// buffer. A window starting past the end falls back to the head of the
    /// buffer so short files still get analysed.
    pub fn window(&self, offset_seconds: f64, length_seconds: f64) -> &[f32] {
        let rate = self.sample_rate as f64;
        let len = self.samples.len();
        let mut start = (offset_seconds.max(0.0) * rate) as usize;
        let count = (length_seconds.max(0.0) * rate) as usize;
        if start >= len {
            start = 0;
        }
        let end = start.saturating_add(count).min(len);
        &self.samples[start..end]
    }
}

/// Synthesises an [`Analysis`] for a source without official data.
///
/// Only the tempo, energy (window RMS) and loudness (dBFS of that RMS) can
/// be recovered; beats, bars and sections stay unknown so the beat engine
/// uses its estimation branch.
pub fn estimate_from_pcm(pcm: &PcmBuffer, config: &EstimationConfig) -> Analysis {
    let window = pcm.window(config.offset_seconds, config.window_seconds);
    let tempo = timing::detect_tempo(window, pcm.sample_rate);

    let rms = compute_rms(window);
    let (energy, loudness) = match rms {
        Some(rms) if rms > 0.0 => (Some(rms), Some(20.0 * rms.log10())),
        Some(rms) => (Some(rms), None),
        None => (None, None),
    };

    tracing::debug!(
        tempo,
        samples = window.len(),
        sample_rate = pcm.sample_rate,
        "estimated analysis from pcm"
    );

    Analysis {
        tempo: Some(tempo),
        energy,
        loudness,
        ..Default::default()
    }
}

fn compute_rms(samples: &[f32]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|sample| (*sample as f64).powi(2)).sum();
    Some((sum / samples.len() as f64).sqrt())
}
