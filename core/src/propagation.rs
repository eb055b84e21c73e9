//! Free-integration propagator for strapdown sensor streams
//!
//! The [`Propagator`] advances a navigation state through a fixed, externally
//! supplied (possibly non-uniform) time sequence by integrating the forward
//! mechanization rates of [`crate::mechanization`]. Construction fixes the initial
//! state, the integration scheme, and the attitude representation; a call to
//! [`Propagator::free_integration`] then runs Initialized → Stepping → Completed and
//! returns the full trajectory, one state per input epoch.
//!
//! Two schemes are offered:
//!
//! - **Explicit Euler**: rates are evaluated at the previous epoch and every state
//!   component advances by `rate * dt`. The DCM attitude form advances by the
//!   first-order small-rotation update and is re-orthonormalized every step.
//! - **Runge-Kutta 4**: the classic four-stage scheme over each `[t[i-1], t[i]]`
//!   interval. The midpoint stages consume the average of the bracketing sensor
//!   samples as the half-step input interpolation, so a valid state is produced at
//!   *every* input epoch — there are no invalid or sentinel output slots.
//!
//! Euler-angle attitude states are re-wrapped to their canonical ranges after every
//! step; DCM states are projected back onto the rotation manifold. Numerical
//! degeneracies (polar latitude, a non-increasing time stamp) abort the run with the
//! offending epoch index rather than silently propagating NaN.

use crate::attitude::{dcm_to_euler, euler_to_dcm, normalize_euler, orthonormalize};
use crate::mechanization::{self, AttitudeRate, AttitudeState, NavRates};
use crate::{EulerAngles, ImuReadout, NavError, NavState, PositionLld, Trajectory, VelocityNed};
use clap::ValueEnum;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Fixed-step integration scheme used to advance the navigation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationScheme {
    /// Explicit (forward) Euler: first order, cheap, needs a small step.
    #[default]
    Euler,
    /// Classic fourth-order Runge-Kutta with midpoint input interpolation.
    RungeKutta4,
}

/// Which carrier the propagator integrates the attitude in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AttitudeRepresentation {
    /// Euler angles; compact, but singular at pitch ±π/2 (gimbal lock).
    #[default]
    Euler,
    /// Direction cosine matrix; free of the gimbal-lock singularity, kept
    /// orthonormal by projection after every step.
    Dcm,
}

/// Internal integration state: LLD position, NED velocity, attitude carrier.
#[derive(Clone, Copy, Debug)]
struct StateVector {
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    attitude: AttitudeCarrier,
}

#[derive(Clone, Copy, Debug)]
enum AttitudeCarrier {
    Euler(Vector3<f64>),
    Dcm(Matrix3<f64>),
}

impl StateVector {
    fn attitude_state(&self) -> AttitudeState {
        match self.attitude {
            AttitudeCarrier::Euler(v) => AttitudeState::Euler(EulerAngles::from_vector(&v)),
            AttitudeCarrier::Dcm(c_bn) => AttitudeState::Dcm(c_bn),
        }
    }

    /// `self + rates * h`, component-wise in whatever carrier the attitude uses.
    fn add_scaled(&self, rates: &NavRates, h: f64) -> StateVector {
        let attitude = match (self.attitude, &rates.attitude) {
            (AttitudeCarrier::Euler(v), AttitudeRate::Euler(rate)) => {
                AttitudeCarrier::Euler(v + rate * h)
            }
            (AttitudeCarrier::Dcm(c), AttitudeRate::Dcm(c_dot)) => {
                AttitudeCarrier::Dcm(c + c_dot * h)
            }
            _ => unreachable!("attitude rate carrier always matches the state carrier"),
        };
        StateVector {
            position: self.position + rates.position * h,
            velocity: self.velocity + rates.velocity * h,
            attitude,
        }
    }

    /// Re-wrap Euler angles / re-orthonormalize the DCM after a completed step.
    fn canonicalize(&mut self) {
        match &mut self.attitude {
            AttitudeCarrier::Euler(v) => {
                *v = normalize_euler(&EulerAngles::from_vector(v)).as_vector();
            }
            AttitudeCarrier::Dcm(c) => {
                *c = orthonormalize(c);
            }
        }
    }

    fn to_nav_state(&self, time: f64) -> NavState {
        let attitude = match self.attitude {
            AttitudeCarrier::Euler(v) => EulerAngles::from_vector(&v),
            AttitudeCarrier::Dcm(c_bn) => dcm_to_euler(&c_bn.transpose()),
        };
        NavState::new(
            time,
            PositionLld::from_vector(&self.position),
            VelocityNed::from_vector(&self.velocity),
            attitude,
        )
    }
}

/// Combine the four RK4 stage rates into `(k1 + 2 k2 + 2 k3 + k4) / 6`.
fn rk4_blend(k1: &NavRates, k2: &NavRates, k3: &NavRates, k4: &NavRates) -> NavRates {
    let attitude = match (&k1.attitude, &k2.attitude, &k3.attitude, &k4.attitude) {
        (
            AttitudeRate::Euler(a),
            AttitudeRate::Euler(b),
            AttitudeRate::Euler(c),
            AttitudeRate::Euler(d),
        ) => AttitudeRate::Euler((*a + 2.0 * *b + 2.0 * *c + *d) / 6.0),
        (
            AttitudeRate::Dcm(a),
            AttitudeRate::Dcm(b),
            AttitudeRate::Dcm(c),
            AttitudeRate::Dcm(d),
        ) => AttitudeRate::Dcm((*a + 2.0 * *b + 2.0 * *c + *d) / 6.0),
        _ => unreachable!("all stages share one attitude carrier"),
    };
    NavRates {
        position: (k1.position + 2.0 * k2.position + 2.0 * k3.position + k4.position) / 6.0,
        velocity: (k1.velocity + 2.0 * k2.velocity + 2.0 * k3.velocity + k4.velocity) / 6.0,
        attitude,
    }
}

/// Dead-reckoning propagator over an externally supplied sensor stream.
///
/// # Example
/// ```rust
/// use navsim::propagation::{AttitudeRepresentation, IntegrationScheme, Propagator};
/// use navsim::{EulerAngles, NavState, PositionLld, VelocityNed};
///
/// let initial = NavState::new(
///     0.0,
///     PositionLld::from_lla(0.7, 0.2, 100.0),
///     VelocityNed::default(),
///     EulerAngles::default(),
/// );
/// let propagator = Propagator::new(
///     initial,
///     IntegrationScheme::RungeKutta4,
///     AttitudeRepresentation::Dcm,
/// ).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Propagator {
    initial: NavState,
    scheme: IntegrationScheme,
    representation: AttitudeRepresentation,
}

impl Propagator {
    /// Create a propagator from an initial state and the integration choices.
    ///
    /// # Errors
    /// [`NavError::Configuration`] when any component of the initial state is not
    /// finite.
    pub fn new(
        initial: NavState,
        scheme: IntegrationScheme,
        representation: AttitudeRepresentation,
    ) -> Result<Propagator, NavError> {
        let components = [
            initial.time,
            initial.position.latitude,
            initial.position.longitude,
            initial.position.down,
            initial.velocity.north,
            initial.velocity.east,
            initial.velocity.down,
            initial.attitude.roll,
            initial.attitude.pitch,
            initial.attitude.yaw,
        ];
        if components.iter().any(|c| !c.is_finite()) {
            return Err(NavError::Configuration {
                message: "initial navigation state contains non-finite components".to_string(),
            });
        }
        Ok(Propagator {
            initial,
            scheme,
            representation,
        })
    }

    pub fn scheme(&self) -> IntegrationScheme {
        self.scheme
    }

    pub fn representation(&self) -> AttitudeRepresentation {
        self.representation
    }

    /// Integrate a gyro/accel stream into a trajectory ("free integration").
    ///
    /// The three input slices must be equally long; the state at `time[0]` is the
    /// configured initial state and each subsequent epoch is produced by one
    /// integration step. Time stamps must be strictly increasing.
    ///
    /// # Errors
    /// - [`NavError::DimensionMismatch`] when the gyro or accel stream length differs
    ///   from the time stream (checked before any allocation);
    /// - [`NavError::Configuration`] when the time stream is empty;
    /// - [`NavError::NumericalDegeneracy`] with the offending epoch for a
    ///   non-increasing time stamp or a polar-latitude singularity.
    pub fn free_integration(
        &self,
        time: &[f64],
        gyro: &[Vector3<f64>],
        accel: &[Vector3<f64>],
    ) -> Result<Trajectory, NavError> {
        if gyro.len() != time.len() {
            return Err(NavError::DimensionMismatch {
                name: "gyro",
                expected: time.len(),
                actual: gyro.len(),
            });
        }
        if accel.len() != time.len() {
            return Err(NavError::DimensionMismatch {
                name: "accel",
                expected: time.len(),
                actual: accel.len(),
            });
        }
        if time.is_empty() {
            return Err(NavError::Configuration {
                message: "time array is empty".to_string(),
            });
        }

        let attitude = match self.representation {
            AttitudeRepresentation::Euler => {
                AttitudeCarrier::Euler(normalize_euler(&self.initial.attitude).as_vector())
            }
            AttitudeRepresentation::Dcm => {
                AttitudeCarrier::Dcm(euler_to_dcm(&self.initial.attitude).transpose())
            }
        };
        let mut state = StateVector {
            position: self.initial.position.as_vector(),
            velocity: self.initial.velocity.as_vector(),
            attitude,
        };

        let mut trajectory = Trajectory::with_capacity(time.len());
        trajectory.push(state.to_nav_state(time[0]));

        for i in 1..time.len() {
            let dt = time[i] - time[i - 1];
            if dt <= 0.0 || !dt.is_finite() {
                return Err(NavError::NumericalDegeneracy {
                    epoch: i,
                    message: format!("time step {dt} s is not strictly positive"),
                });
            }
            let readout_prev = ImuReadout::from_vectors(gyro[i - 1], accel[i - 1]);
            state = match self.scheme {
                IntegrationScheme::Euler => {
                    let rates = self.rates(&state, &readout_prev).map_err(|e| e.at_epoch(i))?;
                    state.add_scaled(&rates, dt)
                }
                IntegrationScheme::RungeKutta4 => {
                    let readout_curr = ImuReadout::from_vectors(gyro[i], accel[i]);
                    let readout_mid = ImuReadout::from_vectors(
                        0.5 * (gyro[i - 1] + gyro[i]),
                        0.5 * (accel[i - 1] + accel[i]),
                    );
                    let k1 = self.rates(&state, &readout_prev).map_err(|e| e.at_epoch(i))?;
                    let k2 = self
                        .rates(&state.add_scaled(&k1, 0.5 * dt), &readout_mid)
                        .map_err(|e| e.at_epoch(i))?;
                    let k3 = self
                        .rates(&state.add_scaled(&k2, 0.5 * dt), &readout_mid)
                        .map_err(|e| e.at_epoch(i))?;
                    let k4 = self
                        .rates(&state.add_scaled(&k3, dt), &readout_curr)
                        .map_err(|e| e.at_epoch(i))?;
                    state.add_scaled(&rk4_blend(&k1, &k2, &k3, &k4), dt)
                }
            };
            state.canonicalize();
            trajectory.push(state.to_nav_state(time[i]));
        }

        Ok(trajectory)
    }

    fn rates(&self, state: &StateVector, readout: &ImuReadout) -> Result<NavRates, NavError> {
        mechanization::nav_rates(
            readout,
            &PositionLld::from_vector(&state.position),
            &VelocityNed::from_vector(&state.velocity),
            &state.attitude_state(),
        )
    }
}
