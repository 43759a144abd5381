//! Beat synchronisation engine.
//!
//! [`BeatBus`] maps an externally supplied transport time to beat, bar and
//! section positions. It never reads a clock for its answers: render loops
//! call [`BeatBus::set_current_time`] and [`BeatBus::at`] once per frame, and
//! clip editors call the downbeat quantisers.
//!
//! Two strategies sit behind the single [`BeatBus::at`] query:
//!
//! * **official** – the loaded [`Analysis`] has beats; phases come from the
//!   bracketing beat and bar pairs and the section list.
//! * **estimated** – no beats; phases are derived from the held tempo
//!   assuming a constant 4/4 meter, and the section index is always 0.

mod shared;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{timing::DEFAULT_TEMPO, Analysis, Result};

pub use shared::SharedBeatBus;

/// Meter assumed by the estimation branch.
pub const BEATS_PER_BAR: f64 = 4.0;

/// Relative distance from a whole beat or bar that still counts as on it.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Largest `f64` strictly below 1.
const PHASE_CEILING: f64 = 1.0 - f64::EPSILON / 2.0;

/// Beat state at one instant. Computed fresh on every query.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatSnapshot {
    pub beat_index: i64,
    /// Progress through the current beat, in `[0, 1)`.
    pub beat_phase: f64,
    pub bar_index: i64,
    /// Progress through the current bar, in `[0, 1)`.
    pub bar_phase: f64,
    /// Index of the first section containing the time, or 0.
    pub section_index: usize,
    /// Echo of the queried time.
    pub current_time: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone)]
pub struct BeatBus {
    analysis: Option<Arc<Analysis>>,
    tempo: f64,
    current_time: f64,
    is_playing: bool,
    wall_clock_anchor: Instant,
}

impl Default for BeatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatBus {
    pub fn new() -> Self {
        Self {
            analysis: None,
            tempo: DEFAULT_TEMPO,
            current_time: 0.0,
            is_playing: false,
            wall_clock_anchor: Instant::now(),
        }
    }

    /// Replaces the held analysis wholesale.
    ///
    /// The analysis is validated first; a malformed one is rejected and the
    /// engine keeps its previous state. The tempo is recomputed from the new
    /// analysis alone: its explicit tempo, else the tempo implied by its
    /// beat spacing, else [`DEFAULT_TEMPO`].
    pub fn set_analysis(&mut self, analysis: impl Into<Arc<Analysis>>) -> Result<()> {
        let analysis = analysis.into();
        analysis.validate()?;

        let tempo = match (analysis.tempo, analysis.inferred_tempo()) {
            (Some(explicit), _) => explicit,
            (None, Some(inferred)) => {
                tracing::debug!(inferred, "analysis has no tempo, inferred from beats");
                inferred
            }
            (None, None) => {
                tracing::debug!("analysis has no tempo, using default");
                DEFAULT_TEMPO
            }
        };

        tracing::debug!(
            tempo,
            beats = analysis.beats.len(),
            bars = analysis.bars.len(),
            sections = analysis.sections.len(),
            "analysis replaced"
        );
        self.tempo = tempo;
        self.analysis = Some(analysis);
        Ok(())
    }

    /// Drops the analysis and returns to the default tempo. Transport state
    /// is kept.
    pub fn clear_analysis(&mut self) {
        self.analysis = None;
        self.tempo = DEFAULT_TEMPO;
    }

    /// Back to the freshly constructed state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Overwrites the transport time. Values outside the track are accepted
    /// and produce extrapolated snapshots.
    pub fn set_current_time(&mut self, time: f64) {
        self.current_time = time;
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing && !self.is_playing {
            let offset = Duration::try_from_secs_f64(self.current_time.max(0.0)).unwrap_or_default();
            let now = Instant::now();
            self.wall_clock_anchor = now.checked_sub(offset).unwrap_or(now);
        }
        self.is_playing = playing;
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_deref()
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn beat_duration(&self) -> f64 {
        60.0 / self.tempo
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Wall-clock seconds since the transport would have been at zero,
    /// as anchored by the last transition to playing. Informational only.
    pub fn elapsed_since_anchor(&self) -> f64 {
        self.wall_clock_anchor.elapsed().as_secs_f64()
    }

    /// True when snapshots come from official beat data.
    pub fn has_official_beats(&self) -> bool {
        self.official_beats().is_some()
    }

    /// Snapshot at the held transport time.
    pub fn current(&self) -> BeatSnapshot {
        self.at(self.current_time)
    }

    pub fn at(&self, time: f64) -> BeatSnapshot {
        match self.official_beats() {
            Some(analysis) => self.official_snapshot(analysis, time),
            None => self.estimated_snapshot(time),
        }
    }

    /// First downbeat strictly after `time`. Without one, rounds up to the
    /// next beat boundary of the held tempo.
    pub fn quantize_to_next_downbeat(&self, time: f64) -> f64 {
        self.next_official_downbeat(time).unwrap_or_else(|| {
            let beat = self.beat_duration();
            (time / beat).ceil() * beat
        })
    }

    /// First downbeat strictly after `time`. Without one, one beat later.
    pub fn get_next_downbeat(&self, time: f64) -> f64 {
        self.next_official_downbeat(time)
            .unwrap_or_else(|| time + self.beat_duration())
    }

    fn official_beats(&self) -> Option<&Analysis> {
        self.analysis
            .as_deref()
            .filter(|analysis| analysis.has_beats())
    }

    fn next_official_downbeat(&self, time: f64) -> Option<f64> {
        let beats = &self.analysis.as_deref()?.beats;
        let first_after = beats.partition_point(|beat| beat.time <= time);
        beats[first_after..]
            .iter()
            .find(|beat| beat.is_downbeat)
            .map(|beat| beat.time)
    }

    fn official_snapshot(&self, analysis: &Analysis, time: f64) -> BeatSnapshot {
        let (beat_index, beat_phase) =
            bracket(&analysis.beats, time, |beat| beat.time).unwrap_or((0, 0.0));
        let (bar_index, bar_phase) =
            bracket(&analysis.bars, time, |bar| bar.time).unwrap_or((0, 0.0));
        let section_index = analysis
            .sections
            .iter()
            .position(|section| section.contains(time))
            .unwrap_or(0);

        BeatSnapshot {
            beat_index: beat_index as i64,
            beat_phase,
            bar_index: bar_index as i64,
            bar_phase,
            section_index,
            current_time: time,
            bpm: self.tempo,
        }
    }

    fn estimated_snapshot(&self, time: f64) -> BeatSnapshot {
        let beat_duration = self.beat_duration();
        let bar_duration = beat_duration * BEATS_PER_BAR;

        let (beat_index, beat_phase) = grid_position(time, beat_duration);
        let (bar_index, bar_phase) = grid_position(time, bar_duration);

        BeatSnapshot {
            beat_index,
            beat_phase,
            bar_index,
            bar_phase,
            section_index: 0,
            current_time: time,
            bpm: self.tempo,
        }
    }
}

/// Index and phase of the pair `(items[i], items[i + 1])` with
/// `items[i] <= time < items[i + 1]`. `items` must be sorted. Times before
/// the first or at/after the last item have no bracket.
///
/// With sorted input this matches a forward scan for the first bracketing
/// pair, including runs of duplicate times.
fn bracket<T>(items: &[T], time: f64, at: impl Fn(&T) -> f64) -> Option<(usize, f64)> {
    let upper = items.partition_point(|item| at(item) <= time);
    if upper == 0 || upper >= items.len() {
        return None;
    }
    let start = at(&items[upper - 1]);
    let end = at(&items[upper]);
    Some((upper - 1, phase(time - start, end - start)))
}

/// Index and phase of `time` on a grid of `length`, both taken from one
/// quotient. A quotient within rounding distance of an integer is a
/// boundary and gets phase 0.
fn grid_position(time: f64, length: f64) -> (i64, f64) {
    let mut position = time / length;
    let nearest = position.round();
    if (position - nearest).abs() <= nearest.abs().max(1.0) * BOUNDARY_TOLERANCE {
        position = nearest;
    }
    let index = position.floor();
    (index as i64, phase(position - index, 1.0))
}

/// `offset / length` clamped into `[0, 1)`.
fn phase(offset: f64, length: f64) -> f64 {
    let value = offset / length;
    if value.is_nan() || value < 0.0 {
        0.0
    } else if value >= 1.0 {
        PHASE_CEILING
    } else {
        value
    }
}
