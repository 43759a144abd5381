//! Canonical rhythmic and mood structure for one track.
//!
//! An [`Analysis`] is either copied verbatim from a source that publishes
//! official beat-level data or synthesised locally from PCM (see
//! [`estimate_from_pcm`]). Every field is optional: absence means "unknown",
//! never zero.

mod estimate;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{timing, Result, XsrcError};

pub use estimate::{estimate_from_pcm, PcmBuffer};

/// A single beat position in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beat {
    #[serde(rename = "t", alias = "time")]
    pub time: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_downbeat: bool,
}

impl Beat {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            is_downbeat: false,
        }
    }

    pub fn downbeat(time: f64) -> Self {
        Self {
            time,
            is_downbeat: true,
        }
    }
}

/// Start of a bar in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "t", alias = "time")]
    pub time: f64,
}

impl Bar {
    pub fn new(time: f64) -> Self {
        Self { time }
    }
}

/// Structural section of a track (intro, chorus, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Section {
    pub start: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Section {
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start,
            duration,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Beats per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beats: Vec<Beat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bars: Vec<Bar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danceability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
}

impl Analysis {
    /// Analysis carrying nothing but a tempo.
    pub fn with_tempo(bpm: f64) -> Self {
        Self {
            tempo: Some(bpm),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and validates an analysis stored as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let analysis: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        analysis.validate()?;
        Ok(analysis)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn has_beats(&self) -> bool {
        !self.beats.is_empty()
    }

    /// Tempo implied by the spacing of the beat list, when at least two
    /// positive gaps exist.
    pub fn inferred_tempo(&self) -> Option<f64> {
        let intervals: Vec<f64> = self
            .beats
            .windows(2)
            .map(|pair| pair[1].time - pair[0].time)
            .filter(|interval| *interval > 0.0)
            .collect();

        if intervals.len() < 2 {
            return None;
        }
        Some(timing::bpm_from_intervals(&intervals))
    }

    /// Checks the ordering and range invariants the beat engine relies on.
    ///
    /// Sections may overlap; lookups take the first match.
    pub fn validate(&self) -> Result<()> {
        if let Some(tempo) = self.tempo {
            if !(tempo.is_finite() && tempo > 0.0) {
                return Err(invalid("tempo", 0, "must be a positive finite number"));
            }
        }

        check_timeline("beats", self.beats.iter().map(|beat| beat.time))?;
        check_timeline("bars", self.bars.iter().map(|bar| bar.time))?;

        for (index, section) in self.sections.iter().enumerate() {
            if !section.start.is_finite() || section.start < 0.0 {
                return Err(invalid("sections", index, "start must be finite and non-negative"));
            }
            if !section.duration.is_finite() || section.duration < 0.0 {
                return Err(invalid(
                    "sections",
                    index,
                    "duration must be finite and non-negative",
                ));
            }
        }

        Ok(())
    }
}

fn check_timeline(field: &'static str, times: impl Iterator<Item = f64>) -> Result<()> {
    let mut previous = 0.0_f64;
    for (index, time) in times.enumerate() {
        if !time.is_finite() || time < 0.0 {
            return Err(invalid(field, index, "time must be finite and non-negative"));
        }
        if time < previous {
            return Err(invalid(field, index, "times must be non-decreasing"));
        }
        previous = time;
    }
    Ok(())
}

fn invalid(field: &'static str, index: usize, reason: &'static str) -> XsrcError {
    XsrcError::InvalidAnalysis {
        field,
        index,
        reason,
    }
}
