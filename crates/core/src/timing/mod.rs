//! Stateless timing helpers shared by the beat engine, the PCM estimator and
//! the clip editor. Everything here is a pure function and safe to call from
//! any thread.

mod autocorrelation;

use self::autocorrelation::{correlation_at, direct_autocorrelation, fft_autocorrelation};

/// Tempo reported whenever there is not enough signal to infer one.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Slowest tempo considered by [`detect_tempo`].
pub const MIN_DETECT_BPM: f64 = 60.0;

/// Fastest tempo considered by [`detect_tempo`].
pub const MAX_DETECT_BPM: f64 = 200.0;

/// Above this many multiply-adds the autocorrelation is evaluated through an
/// FFT rather than with direct sums.
const DIRECT_WORK_LIMIT: usize = 1 << 22;

/// FFT correlations within `r[0] * FFT_TOLERANCE` of the peak are recomputed
/// with direct sums before a lag is picked. Anything at or below that level
/// is treated as silence.
const FFT_TOLERANCE: f64 = 1e-9;

/// Converts whole milliseconds to seconds.
pub fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Converts seconds to whole milliseconds, flooring and clamping at zero.
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).floor() as u64
    } else {
        0
    }
}

/// Formats a position as `MM:SS`. Fields are floored so the display never
/// runs ahead of the true position.
pub fn format_time(seconds: f64) -> String {
    let (mins, secs, _) = split_time(seconds);
    format!("{mins:02}:{secs:02}")
}

/// Formats a position as `MM:SS.mmm`.
pub fn format_time_with_ms(seconds: f64) -> String {
    let (mins, secs, millis) = split_time(seconds);
    format!("{mins:02}:{secs:02}.{millis:03}")
}

fn split_time(seconds: f64) -> (u64, u64, u64) {
    let total_ms = seconds_to_ms(seconds);
    (total_ms / 60_000, (total_ms / 1000) % 60, total_ms % 1000)
}

/// Average tempo implied by a list of beat intervals in seconds.
///
/// Fewer than two intervals is not enough signal and yields
/// [`DEFAULT_TEMPO`], as does a non-positive mean.
pub fn bpm_from_intervals(intervals: &[f64]) -> f64 {
    if intervals.len() < 2 {
        return DEFAULT_TEMPO;
    }

    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean > 0.0 && mean.is_finite() {
        60.0 / mean
    } else {
        DEFAULT_TEMPO
    }
}

/// Estimates a tempo from raw samples by autocorrelation over the
/// 60–200 BPM period window.
///
/// The correlation is not normalised by segment energy, so loud passages
/// weigh more heavily than quiet ones. Cost grows with
/// `samples × period range`; callers should pass a trimmed analysis window
/// rather than a whole track. Degenerate input returns [`DEFAULT_TEMPO`].
pub fn detect_tempo(samples: &[f32], sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return DEFAULT_TEMPO;
    }

    let rate = sample_rate as f64;
    let min_period = ((rate * 60.0 / MAX_DETECT_BPM).floor() as usize).max(1);
    let max_period = (rate * 60.0 / MIN_DETECT_BPM).floor() as usize;

    // Lags at or beyond the sample count have no overlapping pairs.
    if samples.len() <= min_period {
        return DEFAULT_TEMPO;
    }
    let last_period = max_period.min(samples.len() - 1);
    let span = last_period + 1 - min_period;

    let best_period = if samples.len().saturating_mul(span) <= DIRECT_WORK_LIMIT {
        best_lag(&direct_autocorrelation(samples, min_period, last_period), min_period)
    } else {
        match fft_autocorrelation(samples, last_period) {
            Ok(correlations) => best_fft_lag(samples, &correlations, min_period),
            Err(err) => {
                tracing::warn!(%err, "fft autocorrelation failed, using direct sums");
                best_lag(&direct_autocorrelation(samples, min_period, last_period), min_period)
            }
        }
    };

    match best_period {
        Some(period) => (60.0 * rate) / period as f64,
        None => DEFAULT_TEMPO,
    }
}

/// Picks the first lag whose correlation strictly exceeds every earlier one
/// and zero.
fn best_lag(correlations: &[f64], first_lag: usize) -> Option<usize> {
    let mut best = 0.0;
    let mut best_period = None;
    for (offset, &correlation) in correlations.iter().enumerate() {
        if correlation > best {
            best = correlation;
            best_period = Some(first_lag + offset);
        }
    }
    best_period
}

/// Same selection as [`best_lag`] over direct sums, given FFT estimates for
/// lags `0..`. FFT rounding can reorder exact ties, so every lag near the
/// FFT peak is recomputed exactly and the first maximum of those wins.
fn best_fft_lag(samples: &[f32], correlations: &[f64], first_lag: usize) -> Option<usize> {
    let tolerance = correlations[0] * FFT_TOLERANCE;
    let estimates = correlations.get(first_lag..)?;
    let peak = estimates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak <= tolerance {
        return None;
    }

    let mut best = 0.0;
    let mut best_period = None;
    for (offset, &estimate) in estimates.iter().enumerate() {
        if estimate < peak - tolerance {
            continue;
        }
        let lag = first_lag + offset;
        let exact = correlation_at(samples, lag);
        if exact > best {
            best = exact;
            best_period = Some(lag);
        }
    }
    best_period
}

/// Rounds `time` to the nearest multiple of `grid_size`. Ties round away
/// from zero, so `quantize_to_grid(6.0, 4.0) == 8.0`. A non-positive grid
/// leaves the time untouched.
pub fn quantize_to_grid(time: f64, grid_size: f64) -> f64 {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return time;
    }
    (time / grid_size).round() * grid_size
}

/// Grid positions `0, g, 2g, …` up to and including `duration`.
pub fn grid_lines(duration: f64, grid_size: f64) -> Vec<f64> {
    if grid_size <= 0.0 || !grid_size.is_finite() || duration < 0.0 || !duration.is_finite() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut index = 0_u64;
    loop {
        let time = index as f64 * grid_size;
        if time > duration {
            break;
        }
        lines.push(time);
        index += 1;
    }
    lines
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn impulse_train(bpm: f64, sample_rate: u32, seconds: f64) -> Vec<f32> {
        let len = (sample_rate as f64 * seconds) as usize;
        let period = (sample_rate as f64 * 60.0 / bpm).round() as usize;
        let mut samples = vec![0.0_f32; len];
        for index in (0..len).step_by(period) {
            samples[index] = 1.0;
        }
        samples
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(65.0), "01:05");
        assert_eq!(format_time(59.999), "00:59");
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(-3.0), "00:00");
        assert_eq!(format_time(f64::NAN), "00:00");
    }

    #[test]
    fn formats_milliseconds_by_flooring() {
        assert_eq!(format_time_with_ms(65.25), "01:05.250");
        assert_eq!(format_time_with_ms(125.9999), "02:05.999");
    }

    #[test]
    fn converts_between_units() {
        assert_abs_diff_eq!(ms_to_seconds(1500), 1.5);
        assert_eq!(seconds_to_ms(1.5), 1500);
        assert_eq!(seconds_to_ms(-1.0), 0);
    }

    #[test]
    fn bpm_defaults_without_enough_intervals() {
        assert_eq!(bpm_from_intervals(&[]), DEFAULT_TEMPO);
        assert_eq!(bpm_from_intervals(&[0.5]), DEFAULT_TEMPO);
        assert_abs_diff_eq!(bpm_from_intervals(&[0.5, 0.5]), 120.0);
        assert_abs_diff_eq!(bpm_from_intervals(&[0.4, 0.6, 0.5]), 120.0);
        assert_abs_diff_eq!(bpm_from_intervals(&[1.0, 1.0]), 60.0);
        assert_eq!(bpm_from_intervals(&[0.0, 0.0]), DEFAULT_TEMPO);
    }

    #[test]
    fn detects_tempo_of_impulse_train() {
        let samples = impulse_train(100.0, 44_100, 4.0);
        let bpm = detect_tempo(&samples, 44_100);
        assert!((bpm - 100.0).abs() < 2.0, "detected {bpm}");
    }

    #[test]
    fn direct_and_fft_paths_agree() {
        // Small enough for direct sums.
        let samples = impulse_train(150.0, 400, 3.0);
        let direct = direct_autocorrelation(&samples, 120, 400);
        let fft = fft_autocorrelation(&samples, 400).unwrap();
        for (offset, value) in direct.iter().enumerate() {
            assert_abs_diff_eq!(*value, fft[120 + offset], epsilon = 1e-9);
        }
        let bpm = detect_tempo(&samples, 400);
        assert_abs_diff_eq!(bpm, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn exact_ties_keep_the_earliest_period() {
        // Lags 13 230, 20 000 and 33 230 each see exactly one impulse pair.
        let mut samples = vec![0.0_f32; 88_200];
        for index in [0, 13_230, 33_230] {
            samples[index] = 1.0;
        }
        assert_eq!(detect_tempo(&samples, 44_100), 200.0);
    }

    #[test]
    fn fft_selection_matches_direct_sums_at_full_rate() {
        let sample_rate = 44_100;
        let mut state = 0x2545_f491_u32;
        let mut samples: Vec<f32> = (0..20_000)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1 << 24) as f32 * 0.1 - 0.05
            })
            .collect();
        // 150 BPM clicks.
        for index in (0..samples.len()).step_by(17_640) {
            samples[index] += 1.0;
        }

        let min_period = 13_230;
        let last_period = samples.len() - 1;
        let direct = direct_autocorrelation(&samples, min_period, last_period);
        let expected = best_lag(&direct, min_period).unwrap();

        let bpm = detect_tempo(&samples, sample_rate);
        assert_eq!(bpm, 60.0 * sample_rate as f64 / expected as f64);
    }

    #[test]
    fn degenerate_input_falls_back_to_default() {
        assert_eq!(detect_tempo(&[], 44_100), DEFAULT_TEMPO);
        assert_eq!(detect_tempo(&[1.0; 100], 44_100), DEFAULT_TEMPO);
        assert_eq!(detect_tempo(&[1.0; 100], 0), DEFAULT_TEMPO);
        assert_eq!(detect_tempo(&vec![0.0; 2_000], 1_000), DEFAULT_TEMPO);
    }

    #[test]
    fn quantizes_to_nearest_grid_line() {
        assert_abs_diff_eq!(quantize_to_grid(7.0, 4.0), 8.0);
        assert_abs_diff_eq!(quantize_to_grid(5.0, 4.0), 4.0);
        assert_abs_diff_eq!(quantize_to_grid(6.0, 4.0), 8.0);
        assert_abs_diff_eq!(quantize_to_grid(1.26, 0.25), 1.25);
        assert_eq!(quantize_to_grid(3.3, 0.0), 3.3);
    }

    #[test]
    fn grid_lines_include_exact_duration() {
        assert_eq!(grid_lines(2.0, 0.5), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(grid_lines(1.9, 0.5), vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(grid_lines(0.0, 1.0), vec![0.0]);
        assert!(grid_lines(4.0, 0.0).is_empty());
        assert!(grid_lines(-1.0, 1.0).is_empty());
    }
}
