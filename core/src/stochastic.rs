//! Discrete-time stochastic process generators for sensor-error modeling
//!
//! Sensor error budgets are expressed as a handful of canonical random processes:
//! white observation noise, a run-to-run random constant (turn-on bias), a random
//! walk, and the first-order Gauss-Markov process that models correlated bias drift.
//! This module provides a serde-tagged configuration type ([`ProcessModel`]) matching
//! the sensor-profile JSON schema, and the realized generator ([`ProcessGenerator`])
//! that draws realizations from it.
//!
//! Every generator owns its own [`StdRng`] seeded at construction, so Monte-Carlo
//! trials are reproducible run-to-run and independent across parallel workers; there
//! is no process-wide generator. Each [`ProcessGenerator::compute`] call draws fresh
//! randomness — realizations are not restartable, re-seed to repeat one.
//!
//! The spectral and Allan-variance utilities used to fingerprint realized processes
//! live in [`crate::stats`].

use crate::NavError;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Configuration of one stochastic error process.
///
/// This is the wire form found in sensor-profile files; statistics are already
/// unit-converted to SI by the loader. The per-axis lists hold either one entry per
/// axis or a single entry broadcast across all axes.
///
/// ## Example
/// ```
/// use navsim::stochastic::ProcessModel;
///
/// let spec: ProcessModel = serde_json::from_str(
///     r#"{ "kind": "gauss_markov", "std": [1e-4, 1e-4, 1e-4], "correlation_time": 3600.0 }"#,
/// ).unwrap();
/// let mut generator = spec.build(1000, 3, 42).unwrap();
/// let realization = generator.compute(Some(0.01));
/// assert_eq!(realization.shape(), (1000, 3));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessModel {
    /// Independent zero-mean Gaussian draw per sample.
    ///
    /// `std` is the discrete-time standard deviation; when a sampling period is
    /// supplied to [`ProcessGenerator::compute`] it is treated as the continuous-time
    /// PSD constant and deflated by `1/sqrt(dt)` into a discrete sigma.
    WhiteNoise { std: Vec<f64> },
    /// One Gaussian draw per axis, held constant over the whole realization
    /// (run-to-run random turn-on bias).
    RandomConstant { std: Vec<f64> },
    /// Deterministic per-axis value held constant (a known, repeatable bias).
    Constant { value: Vec<f64> },
    /// Cumulative sum of independent Gaussian increments; variance grows linearly
    /// with the sample count.
    RandomWalk { std: Vec<f64> },
    /// First-order autoregressive (Gauss-Markov) process
    /// `x[t] = exp(-dt/tau) x[t-1] + N(0, std sqrt(1 - exp(-2 dt/tau)))`,
    /// stationary standard deviation `std`, correlation time `tau` in seconds.
    ///
    /// A non-positive or non-finite correlation time selects the `tau -> inf`
    /// limit, which is a random walk; [`ProcessModel::build`] performs that
    /// substitution so the recursion never degenerates.
    GaussMarkov { std: Vec<f64>, correlation_time: f64 },
}

impl Default for ProcessModel {
    fn default() -> Self {
        ProcessModel::Constant { value: vec![0.0] }
    }
}

impl ProcessModel {
    /// Validate this specification and build a generator that owns its randomness.
    ///
    /// # Arguments
    /// * `samples` - number of time samples per realization (≥ 1)
    /// * `axes` - number of independent axes per realization (≥ 1)
    /// * `seed` - seed for the generator's private [`StdRng`]
    ///
    /// # Errors
    /// [`NavError::Configuration`] when `samples`/`axes` are zero, the statistics
    /// list length matches neither `axes` nor 1, or a statistic is negative or
    /// non-finite.
    pub fn build(
        &self,
        samples: usize,
        axes: usize,
        seed: u64,
    ) -> Result<ProcessGenerator, NavError> {
        if samples == 0 || axes == 0 {
            return Err(NavError::Configuration {
                message: format!(
                    "stochastic process needs at least one sample and one axis, got {samples} x {axes}"
                ),
            });
        }
        let kind = match self {
            ProcessModel::WhiteNoise { std } => ProcessKind::WhiteNoise {
                std: broadcast("white_noise std", std, axes, false)?,
            },
            ProcessModel::RandomConstant { std } => ProcessKind::RandomConstant {
                std: broadcast("random_constant std", std, axes, false)?,
            },
            ProcessModel::Constant { value } => ProcessKind::Constant {
                value: broadcast("constant value", value, axes, true)?,
            },
            ProcessModel::RandomWalk { std } => ProcessKind::RandomWalk {
                std: broadcast("random_walk std", std, axes, false)?,
            },
            ProcessModel::GaussMarkov {
                std,
                correlation_time,
            } => {
                let std = broadcast("gauss_markov std", std, axes, false)?;
                if correlation_time.is_finite() && *correlation_time > 0.0 {
                    ProcessKind::GaussMarkov {
                        std,
                        correlation_time: *correlation_time,
                    }
                } else {
                    // tau -> inf limit of the recursion
                    ProcessKind::RandomWalk { std }
                }
            }
        };
        Ok(ProcessGenerator {
            kind,
            samples,
            axes,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

/// Expand a per-axis statistics list to one entry per axis.
fn broadcast(
    name: &str,
    values: &[f64],
    axes: usize,
    allow_negative: bool,
) -> Result<DVector<f64>, NavError> {
    for v in values {
        if !v.is_finite() || (!allow_negative && *v < 0.0) {
            return Err(NavError::Configuration {
                message: format!("{name} contains an invalid entry {v}"),
            });
        }
    }
    match values.len() {
        1 => Ok(DVector::from_element(axes, values[0])),
        n if n == axes => Ok(DVector::from_column_slice(values)),
        n => Err(NavError::Configuration {
            message: format!("{name} has {n} entries, expected {axes} (or 1 to broadcast)"),
        }),
    }
}

#[derive(Clone, Debug)]
enum ProcessKind {
    WhiteNoise { std: DVector<f64> },
    RandomConstant { std: DVector<f64> },
    Constant { value: DVector<f64> },
    RandomWalk { std: DVector<f64> },
    GaussMarkov { std: DVector<f64>, correlation_time: f64 },
}

/// A validated stochastic process with its own random draw state.
///
/// Realizations are `samples x axes` matrices; one independent realization per
/// [`compute`](ProcessGenerator::compute) call.
#[derive(Clone, Debug)]
pub struct ProcessGenerator {
    kind: ProcessKind,
    samples: usize,
    axes: usize,
    rng: StdRng,
}

impl ProcessGenerator {
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn axes(&self) -> usize {
        self.axes
    }

    /// Draw one realization of the process.
    ///
    /// # Arguments
    /// * `sampling_period` - time between samples in seconds. White noise interprets
    ///   its sigma as a continuous PSD constant and deflates it by `1/sqrt(dt)`;
    ///   Gauss-Markov needs it for the correlation decay (1 s is assumed when absent);
    ///   the remaining kinds ignore it.
    ///
    /// # Returns
    /// A `samples x axes` matrix, rows indexed by time. Random-walk and Gauss-Markov
    /// realizations start at zero in the first row.
    pub fn compute(&mut self, sampling_period: Option<f64>) -> DMatrix<f64> {
        let kind = self.kind.clone();
        let mut realization = DMatrix::zeros(self.samples, self.axes);
        match kind {
            ProcessKind::WhiteNoise { std } => {
                let scale = sampling_period.map_or(1.0, |dt| 1.0 / dt.sqrt());
                for axis in 0..self.axes {
                    let normal = Normal::new(0.0, (std[axis] * scale).max(0.0)).unwrap();
                    for t in 0..self.samples {
                        realization[(t, axis)] = normal.sample(&mut self.rng);
                    }
                }
            }
            ProcessKind::RandomConstant { std } => {
                for axis in 0..self.axes {
                    let normal = Normal::new(0.0, std[axis].max(0.0)).unwrap();
                    let value = normal.sample(&mut self.rng);
                    for t in 0..self.samples {
                        realization[(t, axis)] = value;
                    }
                }
            }
            ProcessKind::Constant { value } => {
                for axis in 0..self.axes {
                    for t in 0..self.samples {
                        realization[(t, axis)] = value[axis];
                    }
                }
            }
            ProcessKind::RandomWalk { std } => {
                for axis in 0..self.axes {
                    let normal = Normal::new(0.0, std[axis].max(0.0)).unwrap();
                    for t in 1..self.samples {
                        realization[(t, axis)] =
                            realization[(t - 1, axis)] + normal.sample(&mut self.rng);
                    }
                }
            }
            ProcessKind::GaussMarkov {
                std,
                correlation_time,
            } => {
                let dt = sampling_period.unwrap_or(1.0);
                let decay = (-dt / correlation_time).exp();
                let driving = (1.0 - (-2.0 * dt / correlation_time).exp()).sqrt();
                for axis in 0..self.axes {
                    let normal = Normal::new(0.0, (std[axis] * driving).max(0.0)).unwrap();
                    for t in 1..self.samples {
                        realization[(t, axis)] =
                            decay * realization[(t - 1, axis)] + normal.sample(&mut self.rng);
                    }
                }
            }
        }
        realization
    }
}

// === Unit tests ===
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_variance(column: &[f64]) -> f64 {
        let n = column.len() as f64;
        let mean = column.iter().sum::<f64>() / n;
        column.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0)
    }

    #[test]
    fn rejects_zero_dimensions() {
        let spec = ProcessModel::WhiteNoise { std: vec![1.0] };
        assert!(matches!(
            spec.build(0, 3, 1),
            Err(NavError::Configuration { .. })
        ));
        assert!(matches!(
            spec.build(10, 0, 1),
            Err(NavError::Configuration { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_std_length() {
        let spec = ProcessModel::WhiteNoise {
            std: vec![1.0, 2.0],
        };
        let err = spec.build(10, 3, 1).unwrap_err();
        match err {
            NavError::Configuration { message } => {
                assert!(message.contains("2"));
                assert!(message.contains("3"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_std() {
        let spec = ProcessModel::RandomWalk { std: vec![-1.0] };
        assert!(matches!(
            spec.build(10, 1, 1),
            Err(NavError::Configuration { .. })
        ));
    }

    #[test]
    fn scalar_std_broadcasts() {
        let spec = ProcessModel::WhiteNoise { std: vec![0.5] };
        let mut generator = spec.build(100, 3, 7).unwrap();
        assert_eq!(generator.axes(), 3);
        assert_eq!(generator.compute(None).shape(), (100, 3));
    }

    #[test]
    fn same_seed_reproduces_realization() {
        let spec = ProcessModel::WhiteNoise { std: vec![1.0] };
        let a = spec.build(50, 2, 99).unwrap().compute(None);
        let b = spec.build(50, 2, 99).unwrap().compute(None);
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_compute_draws_fresh_randomness() {
        let spec = ProcessModel::WhiteNoise { std: vec![1.0] };
        let mut generator = spec.build(50, 1, 99).unwrap();
        let first = generator.compute(None);
        let second = generator.compute(None);
        assert_ne!(first, second);
    }

    #[test]
    fn white_noise_variance_matches_std() {
        let spec = ProcessModel::WhiteNoise { std: vec![2.0] };
        let mut generator = spec.build(200_000, 1, 3).unwrap();
        let realization = generator.compute(None);
        let column: Vec<f64> = realization.column(0).iter().copied().collect();
        let variance = sample_variance(&column);
        assert_approx_eq!(variance, 4.0, 0.1);
    }

    #[test]
    fn white_noise_psd_deflation() {
        let spec = ProcessModel::WhiteNoise { std: vec![0.1] };
        let mut generator = spec.build(200_000, 1, 3).unwrap();
        let realization = generator.compute(Some(0.01));
        let column: Vec<f64> = realization.column(0).iter().copied().collect();
        let variance = sample_variance(&column);
        // sigma_discrete = 0.1 / sqrt(0.01) = 1.0
        assert_approx_eq!(variance, 1.0, 0.05);
    }

    #[test]
    fn random_constant_holds_one_draw() {
        let spec = ProcessModel::RandomConstant { std: vec![1.0, 2.0] };
        let mut generator = spec.build(500, 2, 11).unwrap();
        let realization = generator.compute(None);
        for axis in 0..2 {
            let first = realization[(0, axis)];
            assert!(first != 0.0);
            for t in 1..500 {
                assert_eq!(realization[(t, axis)], first);
            }
        }
        // axes draw independently
        assert_ne!(realization[(0, 0)], realization[(0, 1)]);
    }

    #[test]
    fn constant_is_deterministic() {
        let spec = ProcessModel::Constant {
            value: vec![-0.25, 0.75],
        };
        let mut generator = spec.build(10, 2, 0).unwrap();
        let realization = generator.compute(None);
        for t in 0..10 {
            assert_eq!(realization[(t, 0)], -0.25);
            assert_eq!(realization[(t, 1)], 0.75);
        }
    }

    #[test]
    fn random_walk_starts_at_zero_and_spreads() {
        let spec = ProcessModel::RandomWalk { std: vec![1.0] };
        let mut generator = spec.build(10_000, 1, 21).unwrap();
        let realization = generator.compute(None);
        assert_eq!(realization[(0, 0)], 0.0);
        // after n steps the walk variance is n * std^2; check the scale, loosely
        let last = realization[(9999, 0)].abs();
        assert!(last < 6.0 * 100.0, "walk wandered implausibly far: {last}");
    }

    #[test]
    fn gauss_markov_is_stationary_at_configured_std() {
        let spec = ProcessModel::GaussMarkov {
            std: vec![1.5],
            correlation_time: 2.0,
        };
        let mut generator = spec.build(400_000, 1, 5).unwrap();
        let realization = generator.compute(Some(1.0));
        // discard the initial transient before measuring the stationary spread
        let tail: Vec<f64> = realization.column(0).iter().skip(1000).copied().collect();
        let variance = sample_variance(&tail);
        assert_approx_eq!(variance, 1.5 * 1.5, 0.15);
    }

    #[test]
    fn gauss_markov_degrades_to_random_walk() {
        // tau <= 0 selects the random-walk limit; identical seeds give identical paths
        let gm = ProcessModel::GaussMarkov {
            std: vec![0.3],
            correlation_time: 0.0,
        };
        let rw = ProcessModel::RandomWalk { std: vec![0.3] };
        let a = gm.build(1000, 1, 77).unwrap().compute(None);
        let b = rw.build(1000, 1, 77).unwrap().compute(None);
        assert_eq!(a, b);
    }

    #[test]
    fn process_model_json_round_trip() {
        let spec = ProcessModel::GaussMarkov {
            std: vec![1e-4, 1e-4, 2e-4],
            correlation_time: 300.0,
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"kind\":\"gauss_markov\""));
        let back: ProcessModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result: Result<ProcessModel, _> =
            serde_json::from_str(r#"{ "kind": "pink_noise", "std": [1.0] }"#);
        assert!(result.is_err());
    }
}
