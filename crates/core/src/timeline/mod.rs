use serde::{Deserialize, Serialize};

use crate::{timing, BeatBus, Result, XsrcError};

/// Fixed-rate frame timer for offline render loops. Frame times are
/// `index / fps`, so long runs do not accumulate drift.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_rate: u32,
    frame: u64,
}

impl FrameClock {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            frame: 0,
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn reset(&mut self) {
        self.frame = 0;
    }

    pub fn time_seconds(&self) -> f64 {
        self.frame as f64 / self.frame_rate as f64
    }

    /// Returns the current frame time and moves to the next frame.
    pub fn advance(&mut self) -> f64 {
        let time = self.time_seconds();
        self.frame += 1;
        time
    }

    /// Every frame time in `[0, duration)`.
    pub fn frame_times(&self, duration: f64) -> impl Iterator<Item = f64> {
        let rate = self.frame_rate as f64;
        let frames = if duration > 0.0 {
            (duration * rate).ceil() as u64
        } else {
            0
        };
        (0..frames).map(move |frame| frame as f64 / rate)
    }
}

/// A track excerpt selected in the clip editor, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRange {
    pub track_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ClipRange {
    pub fn new(track_id: impl Into<String>, start_ms: u64, end_ms: u64) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(XsrcError::InvalidInput("clip end must be after its start"));
        }
        Ok(Self {
            track_id: track_id.into(),
            start_ms,
            end_ms,
        })
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Moves both boundaries to the next downbeat. When the snapped end
    /// collapses onto the start, the end is pushed to the downbeat after
    /// the start.
    pub fn snap_to_downbeats(&self, bus: &BeatBus) -> ClipRange {
        let start = bus.quantize_to_next_downbeat(timing::ms_to_seconds(self.start_ms));
        let mut end = bus.quantize_to_next_downbeat(timing::ms_to_seconds(self.end_ms));
        if end <= start {
            end = bus.get_next_downbeat(start);
        }

        let start_ms = timing::seconds_to_ms(start);
        let end_ms = timing::seconds_to_ms(end).max(start_ms + 1);
        tracing::debug!(
            from_start = self.start_ms,
            from_end = self.end_ms,
            start_ms,
            end_ms,
            "snapped clip to downbeats"
        );

        ClipRange {
            track_id: self.track_id.clone(),
            start_ms,
            end_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analysis, Beat};

    #[test]
    fn frame_clock_has_no_drift() {
        let mut clock = FrameClock::new(60);
        for _ in 0..600 {
            clock.advance();
        }
        assert_eq!(clock.time_seconds(), 10.0);

        let times: Vec<f64> = FrameClock::new(4).frame_times(1.0).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(FrameClock::new(0).frame_rate(), 1);
    }

    #[test]
    fn rejects_empty_clips() {
        assert!(ClipRange::new("t", 1_000, 1_000).is_err());
        assert_eq!(ClipRange::new("t", 0, 2_500).unwrap().duration_ms(), 2_500);
    }

    #[test]
    fn snaps_to_official_downbeats() {
        let mut bus = BeatBus::new();
        bus.set_analysis(Analysis {
            beats: (0..12)
                .map(|i| {
                    let time = i as f64 * 0.5;
                    if i % 4 == 0 {
                        Beat::downbeat(time)
                    } else {
                        Beat::new(time)
                    }
                })
                .collect(),
            ..Default::default()
        })
        .unwrap();

        let clip = ClipRange::new("spotify:abc", 300, 2_700).unwrap();
        let snapped = clip.snap_to_downbeats(&bus);
        assert_eq!(snapped.start_ms, 2_000);
        assert_eq!(snapped.end_ms, 4_000);
        assert_eq!(snapped.track_id, "spotify:abc");
    }

    #[test]
    fn collapsed_end_moves_past_start() {
        let bus = BeatBus::new();
        // Both boundaries round up to 0.5 s on the 120 BPM grid.
        let clip = ClipRange::new("local:1", 100, 400).unwrap();
        let snapped = clip.snap_to_downbeats(&bus);
        assert_eq!(snapped.start_ms, 500);
        assert_eq!(snapped.end_ms, 1_000);
    }
}
