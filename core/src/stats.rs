//! Spectral and Allan-variance characterization of realized processes
//!
//! These utilities fingerprint a realized stochastic process: the power spectral
//! density identifies its frequency-domain shape, and the Allan variance identifies
//! the error family by its slope on a log-log (tau, deviation) plot — white noise
//! falls at −1/2, random walk rises at +1/2, and a Gauss-Markov process bends between
//! the two around its correlation time. They are consumed by the test suite and the
//! `process-gen` command, not by the propagator itself.

use nalgebra::DMatrix;

/// Estimate the one-sided power spectral density of each axis via Welch's method
///
/// The signal is split into mean-removed, Hann-windowed segments of up to 1024
/// samples with 50 % overlap; the segment periodograms are averaged and scaled to a
/// density (unit²/Hz). The transform is a direct DFT — the segment length is small
/// enough that no FFT dependency is warranted.
///
/// # Arguments
/// * `x` - realization matrix, rows indexed by time, one column per axis
/// * `fs` - sampling frequency in Hz
///
/// # Returns
/// `(psd, frequencies)` where `psd` has one row per frequency bin and one column per
/// axis, and `frequencies` spans 0..=fs/2.
pub fn power_spectral_density(x: &DMatrix<f64>, fs: f64) -> (DMatrix<f64>, Vec<f64>) {
    let n = x.nrows();
    let segment_length = n.min(1024);
    let step = (segment_length - segment_length / 2).max(1);
    let bins = segment_length / 2 + 1;

    let window: Vec<f64> = (0..segment_length)
        .map(|k| {
            0.5 * (1.0
                - (2.0 * std::f64::consts::PI * k as f64 / segment_length as f64).cos())
        })
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();

    let frequencies: Vec<f64> = (0..bins)
        .map(|k| k as f64 * fs / segment_length as f64)
        .collect();

    let mut psd = DMatrix::zeros(bins, x.ncols());
    for axis in 0..x.ncols() {
        let column: Vec<f64> = x.column(axis).iter().copied().collect();
        let mut segment_count = 0usize;
        let mut start = 0usize;
        while start + segment_length <= n {
            let segment = &column[start..start + segment_length];
            let mean = segment.iter().sum::<f64>() / segment_length as f64;
            for k in 0..bins {
                let mut real = 0.0;
                let mut imag = 0.0;
                for (t, sample) in segment.iter().enumerate() {
                    let angle = -2.0 * std::f64::consts::PI * k as f64 * t as f64
                        / segment_length as f64;
                    let value = (sample - mean) * window[t];
                    real += value * angle.cos();
                    imag += value * angle.sin();
                }
                // one-sided density: interior bins carry both halves of the spectrum
                let mut power = (real * real + imag * imag) / (fs * window_power);
                if k != 0 && !(segment_length % 2 == 0 && k == bins - 1) {
                    power *= 2.0;
                }
                psd[(k, axis)] += power;
            }
            segment_count += 1;
            start += step;
        }
        if segment_count > 0 {
            for k in 0..bins {
                psd[(k, axis)] /= segment_count as f64;
            }
        }
    }
    (psd, frequencies)
}

/// Averaging-interval multipliers spread over decades: 1, 2, ..., 9, 10, 20, ...
///
/// Capped so that every interval keeps at least 9 bins of data, the usual minimum for
/// a meaningful Allan estimate.
fn tau_multipliers(samples: usize) -> Vec<usize> {
    let max_samples_per_bin = samples / 9;
    if max_samples_per_bin == 0 {
        return Vec::new();
    }
    let decades = (max_samples_per_bin as f64).log10().ceil() as usize;
    let mut multipliers = Vec::new();
    let mut scale = 1usize;
    for _ in 0..decades {
        for j in 1..10 {
            let candidate = j * scale;
            if candidate > max_samples_per_bin {
                break;
            }
            multipliers.push(candidate);
        }
        scale *= 10;
    }
    multipliers
}

/// Compute the Allan variance of each axis over decade-spaced averaging intervals
///
/// For each interval the samples are grouped into bins of `m` consecutive samples,
/// bin means are taken, and the Allan variance is half the mean-square of successive
/// bin-mean differences:
///
/// $$
/// \sigma_A^2(\tau) = \frac{1}{2 (N_b - 1)} \sum_{i} \left( \bar{x}_{i+1} - \bar{x}_i \right)^2
/// $$
///
/// # Arguments
/// * `x` - realization matrix, rows indexed by time, one column per axis
/// * `fs` - sampling frequency in Hz
///
/// # Returns
/// `(avar, taus)` where `avar` has one row per averaging interval and one column per
/// axis, and `taus` holds the intervals in seconds. Both are empty when the record is
/// too short for nine bins at the shortest interval.
pub fn allan_variance(x: &DMatrix<f64>, fs: f64) -> (DMatrix<f64>, Vec<f64>) {
    let sampling_period = 1.0 / fs;
    let multipliers = tau_multipliers(x.nrows());
    let taus: Vec<f64> = multipliers
        .iter()
        .map(|m| *m as f64 * sampling_period)
        .collect();

    let mut avar = DMatrix::zeros(multipliers.len(), x.ncols());
    for axis in 0..x.ncols() {
        let samples: Vec<f64> = x.column(axis).iter().copied().collect();
        for (row, &samples_per_bin) in multipliers.iter().enumerate() {
            let bins = samples.len() / samples_per_bin;
            if bins < 9 {
                break;
            }
            let means: Vec<f64> = (0..bins)
                .map(|b| {
                    let bin = &samples[b * samples_per_bin..(b + 1) * samples_per_bin];
                    bin.iter().sum::<f64>() / samples_per_bin as f64
                })
                .collect();
            let sum_sq: f64 = means
                .windows(2)
                .map(|pair| (pair[1] - pair[0]) * (pair[1] - pair[0]))
                .sum();
            avar[(row, axis)] = 0.5 * sum_sq / (bins - 1) as f64;
        }
    }
    (avar, taus)
}

/// Allan deviation (square root of the Allan variance) of each axis
pub fn allan_deviation(x: &DMatrix<f64>, fs: f64) -> (DMatrix<f64>, Vec<f64>) {
    let (avar, taus) = allan_variance(x, fs);
    (avar.map(f64::sqrt), taus)
}

/// Least-squares slope of `values` against `taus` on log-log axes, restricted to
/// `tau_min <= tau <= tau_max`. Pairs with non-positive entries are skipped.
///
/// White noise fingerprints at a slope of −1/2; random walk at +1/2.
pub fn log_log_slope(taus: &[f64], values: &[f64], tau_min: f64, tau_max: f64) -> f64 {
    let points: Vec<(f64, f64)> = taus
        .iter()
        .zip(values.iter())
        .filter(|(tau, value)| **tau >= tau_min && **tau <= tau_max && **value > 0.0)
        .map(|(tau, value)| (tau.ln(), value.ln()))
        .collect();
    if points.len() < 2 {
        return f64::NAN;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let covariance: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let variance: f64 = points.iter().map(|(x, _)| (x - mean_x) * (x - mean_x)).sum();
    covariance / variance
}
