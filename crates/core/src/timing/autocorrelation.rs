use realfft::{num_complex::Complex64, RealFftPlanner};

use crate::Result;

/// Unnormalised autocorrelation `sum(x[i] * x[i + lag])` at one lag.
pub(super) fn correlation_at(samples: &[f32], lag: usize) -> f64 {
    if lag >= samples.len() {
        return 0.0;
    }
    samples[..samples.len() - lag]
        .iter()
        .zip(&samples[lag..])
        .map(|(a, b)| *a as f64 * *b as f64)
        .sum()
}

/// [`correlation_at`] for every lag in `first_lag..=last_lag`.
pub(super) fn direct_autocorrelation(samples: &[f32], first_lag: usize, last_lag: usize) -> Vec<f64> {
    (first_lag..=last_lag)
        .map(|lag| correlation_at(samples, lag))
        .collect()
}

/// Same quantity as [`direct_autocorrelation`] for lags `0..=max_lag`,
/// computed as the inverse transform of the power spectrum. The input is
/// zero padded past `len + max_lag` so the circular correlation does not
/// wrap into the requested lags.
pub(super) fn fft_autocorrelation(samples: &[f32], max_lag: usize) -> Result<Vec<f64>> {
    let fft_len = (samples.len() + max_lag + 1).next_power_of_two();
    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut input = forward.make_input_vec();
    for (slot, sample) in input.iter_mut().zip(samples) {
        *slot = *sample as f64;
    }
    let mut spectrum = forward.make_output_vec();
    forward.process(&mut input, &mut spectrum)?;

    for bin in spectrum.iter_mut() {
        *bin = Complex64::new(bin.norm_sqr(), 0.0);
    }

    let mut output = inverse.make_output_vec();
    inverse.process(&mut spectrum, &mut output)?;

    let scale = fft_len as f64;
    Ok(output
        .into_iter()
        .take(max_lag + 1)
        .map(|value| value / scale)
        .collect())
}
