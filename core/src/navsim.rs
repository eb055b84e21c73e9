//! Strapdown navigation simulation and sensor-emulation toolbox
//!
//! This crate provides the building blocks for simulating the motion of a rigid body
//! carrying an inertial measurement unit and a GPS receiver through the strapdown
//! inertial-navigation equations. It covers two complementary workflows:
//!
//! - **Free integration** (dead reckoning): given a stream of gyroscope and
//!   accelerometer readouts and an initial state, integrate position, velocity, and
//!   attitude forward in time ([`propagation`]).
//! - **Sensor emulation**: given a reference (truth) trajectory, derive the gyroscope
//!   and accelerometer readouts that would have produced it via the inverse
//!   mechanization equations, then corrupt those readouts (and a synthetic GPS
//!   readout) with stochastic sensor-error models ([`emulation`], [`stochastic`]).
//!
//! Primarily built off of [`nalgebra`](https://crates.io/crates/nalgebra) for the
//! linear algebra. The primary reference text is _Principles of GNSS, Inertial, and
//! Multisensor Integrated Navigation Systems, 2nd Edition_ by Paul D. Groves. In
//! general, variables are named according to the quantity they represent rather than
//! the symbol used in the book; this style is sometimes relaxed within the body of a
//! given function where the Groves subscript notation (`w_ib_b`, `f_ib_b`, `C_b^n`)
//! is clearer.
//!
//! # Coordinate and state conventions
//!
//! The navigation state is position, velocity, and attitude:
//!
//! $$
//! x = [p_\phi, p_\lambda, p_d, v_n, v_e, v_d, \phi, \theta, \psi]
//! $$
//!
//! - Position is geodetic latitude and longitude (radians) plus a *down* component in
//!   meters, **positive downward** (the LLD convention; the altitude above the
//!   ellipsoid is the negated down component). See [`PositionLld`].
//! - Velocity is the body velocity with respect to the Earth, resolved in the local
//!   North-East-Down frame. See [`VelocityNed`].
//! - Attitude is either a triplet of Euler angles (roll, pitch, yaw; z-y-x rotation
//!   order applied yaw-pitch-roll) or the direction cosine matrix they generate.
//!   See [`EulerAngles`] and the [`attitude`] module.
//!
//! Because the LLD/LLA sign flip and the NED/ECEF/body velocity resolutions are a
//! recurring source of sign errors, each frame gets its own wrapper type. Passing an
//! ECEF position where an LLD position is expected is a compile error, not a runtime
//! sign bug.
//!
//! # Skew-symmetric notation
//!
//! Groves represents rotational quantities both as vectors (lower case) and as the
//! skew-symmetric matrix form of the same vector (upper case):
//!
//! $$
//! x = \begin{bmatrix} a \\\\ b \\\\ c \end{bmatrix} \rightarrow X = \begin{bmatrix} 0 & -c & b \\\\ c & 0 & -a \\\\ -b & a & 0 \end{bmatrix}
//! $$
//!
//! The conversion lives in [`earth::vector_to_skew_symmetric`].

pub mod attitude;
pub mod earth;
pub mod emulation;
pub mod mechanization;
pub mod propagation;
pub mod sim;
pub mod stats;
pub mod stochastic;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Basic structure for holding IMU data in the form of angular-rate and specific-force vectors.
///
/// The vectors are resolved in the body frame of the vehicle. The gyroscope readout is the
/// angular rate of the body frame with respect to the inertial frame ($\omega_{ib}^b$, rad/s)
/// and the accelerometer readout is the specific force ($f_{ib}^b$, m/s²). This struct is not
/// a hardware driver; the data is assumed to be synchronized, unit-converted, and ready for
/// the mechanization equations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuReadout {
    /// Angular rate in rad/s, body frame x, y, z axis
    pub gyro: Vector3<f64>,
    /// Specific force in m/s², body frame x, y, z axis
    pub accel: Vector3<f64>,
}

impl Display for ImuReadout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ImuReadout {{ gyro: [{:.6}, {:.6}, {:.6}], accel: [{:.4}, {:.4}, {:.4}] }}",
            self.gyro[0], self.gyro[1], self.gyro[2], self.accel[0], self.accel[1], self.accel[2]
        )
    }
}

impl ImuReadout {
    /// Create a new ImuReadout instance with all zeros
    pub fn new() -> ImuReadout {
        ImuReadout::default()
    }
    /// Create a new ImuReadout from gyroscope and accelerometer vectors
    ///
    /// # Arguments
    /// * `gyro` - Angular rate in rad/s in the body frame x, y, z axis.
    /// * `accel` - Specific force in m/s² in the body frame x, y, z axis.
    ///
    /// # Example
    /// ```rust
    /// use navsim::ImuReadout;
    /// use nalgebra::Vector3;
    /// let readout = ImuReadout::from_vectors(
    ///     Vector3::new(0.0, 0.0, 0.0),   // no rotation
    ///     Vector3::new(0.0, 0.0, -9.81), // gravity-opposing specific force
    /// );
    /// ```
    pub fn from_vectors(gyro: Vector3<f64>, accel: Vector3<f64>) -> ImuReadout {
        ImuReadout { gyro, accel }
    }
}

/// Geodetic position in LLD form: latitude, longitude, down.
///
/// Latitude and longitude are in radians; `down` is the height coordinate in meters,
/// **positive downward** so that the position triplet is consistent with the NED axes
/// used for velocity. The altitude above the WGS-84 ellipsoid is `-down`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionLld {
    /// Geodetic latitude in radians
    pub latitude: f64,
    /// Geodetic longitude in radians
    pub longitude: f64,
    /// Down component in meters (negated ellipsoidal altitude)
    pub down: f64,
}

impl PositionLld {
    pub fn new(latitude: f64, longitude: f64, down: f64) -> PositionLld {
        PositionLld {
            latitude,
            longitude,
            down,
        }
    }
    /// Build from the conventional LLA triplet (altitude positive upward).
    pub fn from_lla(latitude: f64, longitude: f64, altitude: f64) -> PositionLld {
        PositionLld {
            latitude,
            longitude,
            down: -altitude,
        }
    }
    /// Altitude above the ellipsoid in meters (positive upward).
    pub fn altitude(&self) -> f64 {
        -self.down
    }
    pub fn from_vector(v: &Vector3<f64>) -> PositionLld {
        PositionLld::new(v[0], v[1], v[2])
    }
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.latitude, self.longitude, self.down)
    }
}

/// Cartesian position in the Earth-centered Earth-fixed frame, meters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionEcef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PositionEcef {
    pub fn new(x: f64, y: f64, z: f64) -> PositionEcef {
        PositionEcef { x, y, z }
    }
    pub fn from_vector(v: &Vector3<f64>) -> PositionEcef {
        PositionEcef::new(v[0], v[1], v[2])
    }
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Body velocity with respect to the Earth, resolved in the local NED frame, m/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityNed {
    /// Velocity north in m/s
    pub north: f64,
    /// Velocity east in m/s
    pub east: f64,
    /// Velocity down in m/s
    pub down: f64,
}

impl VelocityNed {
    pub fn new(north: f64, east: f64, down: f64) -> VelocityNed {
        VelocityNed { north, east, down }
    }
    pub fn from_vector(v: &Vector3<f64>) -> VelocityNed {
        VelocityNed::new(v[0], v[1], v[2])
    }
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.north, self.east, self.down)
    }
}

/// Euler attitude of the body frame with respect to the NED frame, radians.
///
/// Rotation order is z-y-x (yaw, then pitch, then roll), the conventional 3-2-1
/// aerospace sequence. Roll and yaw live in (−π, π], pitch in (−π/2, π/2); pitch at
/// ±π/2 is the gimbal-lock singularity of this representation — prefer the DCM
/// attitude form for near-vertical trajectories.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Roll about the body x axis, radians
    pub roll: f64,
    /// Pitch about the body y axis, radians
    pub pitch: f64,
    /// Yaw about the body z axis, radians
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> EulerAngles {
        EulerAngles { roll, pitch, yaw }
    }
    pub fn from_vector(v: &Vector3<f64>) -> EulerAngles {
        EulerAngles::new(v[0], v[1], v[2])
    }
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.roll, self.pitch, self.yaw)
    }
}

/// One epoch of the navigation state: time, LLD position, NED velocity, Euler attitude.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NavState {
    /// Time of validity in seconds
    pub time: f64,
    pub position: PositionLld,
    pub velocity: VelocityNed,
    pub attitude: EulerAngles,
}

impl Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NavState {{ t: {:.3} s, lat: {:.4} deg, lon: {:.4} deg, alt: {:.2} m, v_n: {:.3} m/s, v_e: {:.3} m/s, v_d: {:.3} m/s, attitude: [{:.2} deg, {:.2} deg, {:.2} deg] }}",
            self.time,
            self.position.latitude.to_degrees(),
            self.position.longitude.to_degrees(),
            self.position.altitude(),
            self.velocity.north,
            self.velocity.east,
            self.velocity.down,
            self.attitude.roll.to_degrees(),
            self.attitude.pitch.to_degrees(),
            self.attitude.yaw.to_degrees()
        )
    }
}

impl NavState {
    pub fn new(
        time: f64,
        position: PositionLld,
        velocity: VelocityNed,
        attitude: EulerAngles,
    ) -> NavState {
        NavState {
            time,
            position,
            velocity,
            attitude,
        }
    }
}

/// A time-ordered sequence of navigation states.
///
/// Reference ("truth") and computed ("estimated") trajectories are distinct instances
/// of this same shape. States are stored densely, one per input epoch; the trajectory
/// is allocated once per run and owned by the propagator or emulator that produced it.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    pub states: Vec<NavState>,
}

impl Trajectory {
    pub fn new() -> Trajectory {
        Trajectory { states: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Trajectory {
        Trajectory {
            states: Vec::with_capacity(n),
        }
    }

    /// Assemble a trajectory from parallel columns.
    ///
    /// # Errors
    /// [`NavError::DimensionMismatch`] when any column length differs from the time
    /// column, reported before anything is allocated.
    pub fn from_columns(
        time: &[f64],
        position: &[PositionLld],
        velocity: &[VelocityNed],
        attitude: &[EulerAngles],
    ) -> Result<Trajectory, NavError> {
        for (name, len) in [
            ("position", position.len()),
            ("velocity", velocity.len()),
            ("attitude", attitude.len()),
        ] {
            if len != time.len() {
                return Err(NavError::DimensionMismatch {
                    name,
                    expected: time.len(),
                    actual: len,
                });
            }
        }
        let mut trajectory = Trajectory::with_capacity(time.len());
        for i in 0..time.len() {
            trajectory
                .states
                .push(NavState::new(time[i], position[i], velocity[i], attitude[i]));
        }
        Ok(trajectory)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn push(&mut self, state: NavState) {
        self.states.push(state);
    }

    /// The time column of the trajectory.
    pub fn times(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.time).collect()
    }
}

/// Error taxonomy for the simulation core.
///
/// Configuration and dimension errors are structural: they are raised at construction
/// or before any computation starts, and abort the run. Numerical degeneracies are
/// attributable to a specific epoch and carry its index so a caller can decide to
/// skip-and-flag or abort; the core never silently emits a partially-updated state.
/// Geodetic convergence shortfalls are deliberately *not* errors — they are logged as
/// warnings and the best estimate is returned, since the residual is far below usable
/// precision.
#[derive(Clone, Debug, PartialEq)]
pub enum NavError {
    /// Invalid construction parameters (integration scheme, attitude representation,
    /// stochastic-process statistics, non-finite initial state, ...).
    Configuration { message: String },
    /// Input arrays of unequal length; reports the offending stream and both lengths.
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A per-epoch numerical singularity (e.g. cos(latitude) vanishing at the poles,
    /// a non-increasing time step). Carries the offending epoch index.
    NumericalDegeneracy { epoch: usize, message: String },
}

impl Display for NavError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavError::Configuration { message } => write!(f, "configuration error: {message}"),
            NavError::DimensionMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "dimension mismatch: '{name}' has length {actual}, expected {expected}"
            ),
            NavError::NumericalDegeneracy { epoch, message } => {
                write!(f, "numerical degeneracy at epoch {epoch}: {message}")
            }
        }
    }
}

impl std::error::Error for NavError {}

impl NavError {
    /// Attach an epoch index to a degeneracy detected inside an epoch-agnostic helper.
    pub(crate) fn at_epoch(self, epoch: usize) -> NavError {
        match self {
            NavError::NumericalDegeneracy { message, .. } => {
                NavError::NumericalDegeneracy { epoch, message }
            }
            other => other,
        }
    }
}

// --- Miscellaneous functions for wrapping angles ---

/// Wrap an angle to the range (−π, π] radians.
///
/// # Example
/// ```rust
/// use navsim::wrap_to_pi;
/// use std::f64::consts::PI;
/// let wrapped = wrap_to_pi(3.0 * PI / 2.0);
/// assert!((wrapped + PI / 2.0).abs() < 1e-12);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut wrapped = angle.rem_euclid(two_pi); // [0, 2π)
    if wrapped > std::f64::consts::PI {
        wrapped -= two_pi;
    }
    wrapped
}

/// Wrap an angle to the range (−180, 180] degrees.
pub fn wrap_to_180(angle: f64) -> f64 {
    let mut wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    wrapped
}
