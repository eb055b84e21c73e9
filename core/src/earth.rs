//! Earth-related constants and functions
//!
//! This module contains the WGS-84 ellipsoid model and the frame machinery the rest of
//! the toolbox is built on: closed-form geodetic to Cartesian conversion and its
//! iterative inverse, the rotations between the Earth-centered Earth-fixed (ECEF)
//! frame and the local-level NED/ENU frames, the principal radii of curvature, the
//! zonal-harmonic gravity model, and the Earth-rate and transport-rate vectors used by
//! the mechanization equations.
//!
//! # Coordinate systems
//! The ECEF frame is a right-handed Cartesian coordinate system with the origin at the
//! Earth's center, rotating with the Earth. The local-level frame is tangent to the
//! ellipsoid at the vehicle position; this crate uses the North-East-Down (NED)
//! resolution internally and provides East-North-Up (ENU) conversions for observers
//! that prefer them. Geodetic positions are carried in the LLD convention (latitude,
//! longitude, down) — see [`PositionLld`](crate::PositionLld) — so the height
//! coordinate has the same sign sense as the NED down axis.
//!
//! All angles in this module are radians.

use crate::{PositionEcef, PositionLld, VelocityNed};
use log::warn;
use nalgebra::{Matrix3, Vector3};

// Earth constants (WGS84)
/// Earth's rotation rate in rad/s ($\omega_{ie}$)
pub const RATE: f64 = 7.292115e-5;
/// Earth's rotation rate vector in the ECEF frame, rad/s
pub const RATE_VECTOR: Vector3<f64> = Vector3::new(0.0, 0.0, RATE);
/// Earth's equatorial radius (semi-major axis) in meters
pub const EQUATORIAL_RADIUS: f64 = 6378137.0;
/// Earth's flattening factor ($f$)
pub const FLATTENING: f64 = 1.0 / 298.257223563;
/// Earth's eccentricity squared ($e^2 = 2f - f^2$)
pub const ECCENTRICITY_SQUARED: f64 = 2.0 * FLATTENING - FLATTENING * FLATTENING;
/// Earth's gravitational parameter ($\mu$) in m³/s²
pub const MU: f64 = 3.986005e14;
/// Earth's second zonal harmonic ($J_2$)
pub const J2: f64 = 1.08262668355315130e-3;
/// Convergence tolerance of the iterative Cartesian-to-geodetic inverse, radians
pub const GEODETIC_TOLERANCE: f64 = 1e-10;
/// Iteration budget of the Cartesian-to-geodetic inverse
pub const GEODETIC_MAX_ITERATIONS: usize = 10;

/// Convert a three-element vector to a skew-symmetric matrix
///
/// Groves' notation uses skew-symmetric matrices to represent cross products and to
/// perform more concise matrix operations (particularly involving rotations), such
/// that `vector_to_skew_symmetric(v) * u == v.cross(&u)`.
///
/// $$
/// x = \begin{bmatrix} a \\\\ b \\\\ c \end{bmatrix} \rightarrow X = \begin{bmatrix} 0 & -c & b \\\\ c & 0 & -a \\\\ -b & a & 0 \end{bmatrix}
/// $$
///
/// # Example
/// ```rust
/// use nalgebra::Vector3;
/// use navsim::earth;
/// let v = Vector3::new(1.0, 2.0, 3.0);
/// let u = Vector3::new(-1.0, 0.5, 0.0);
/// assert_eq!(earth::vector_to_skew_symmetric(&v) * u, v.cross(&u));
/// ```
pub fn vector_to_skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v[2], v[1], //
        v[2], 0.0, -v[0], //
        -v[1], v[0], 0.0,
    )
}

/// Convert a skew-symmetric matrix back to its three-element vector
pub fn skew_symmetric_to_vector(skew: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(skew[(2, 1)], skew[(0, 2)], skew[(1, 0)])
}

/// Convert a geodetic position to Cartesian ECEF coordinates
///
/// Closed-form ellipsoidal-to-Cartesian conversion using the prime-vertical radius of
/// curvature $N = a / \sqrt{1 - e^2 \sin^2\phi}$.
///
/// # Parameters
/// - `latitude` - geodetic latitude in radians
/// - `longitude` - geodetic longitude in radians
/// - `altitude` - height above the ellipsoid in meters, positive upward
///
/// # Example
/// ```rust
/// use navsim::earth;
/// let ecef = earth::geodetic_to_ecef(0.0, 0.0, 0.0);
/// assert!((ecef.x - earth::EQUATORIAL_RADIUS).abs() < 1e-9);
/// ```
pub fn geodetic_to_ecef(latitude: f64, longitude: f64, altitude: f64) -> PositionEcef {
    let sin_lat = latitude.sin();
    let n = EQUATORIAL_RADIUS / (1.0 - ECCENTRICITY_SQUARED * sin_lat * sin_lat).sqrt();
    PositionEcef::new(
        (n + altitude) * latitude.cos() * longitude.cos(),
        (n + altitude) * latitude.cos() * longitude.sin(),
        ((1.0 - ECCENTRICITY_SQUARED) * n + altitude) * sin_lat,
    )
}

/// Convert a Cartesian ECEF position to geodetic coordinates
///
/// Longitude is closed-form (`atan2(y, x)`); latitude and height are refined by a
/// fixed-point iteration that terminates when successive latitude estimates differ by
/// less than [`GEODETIC_TOLERANCE`] or [`GEODETIC_MAX_ITERATIONS`] elapse. Exhausting
/// the iteration budget is not an error: the residual is far below usable precision,
/// so the best estimate is returned and a warning is logged.
///
/// # Returns
/// `(latitude, longitude, altitude)` in radians, radians, meters (altitude positive
/// upward).
pub fn ecef_to_geodetic(position: &PositionEcef) -> (f64, f64, f64) {
    let longitude = position.y.atan2(position.x);
    let p = (position.x * position.x + position.y * position.y).sqrt();

    let mut latitude = if p == 0.0 {
        0.0
    } else {
        (position.z / p).atan2(1.0 - ECCENTRICITY_SQUARED)
    };
    let mut altitude = 0.0;
    let mut converged = false;
    for _ in 0..GEODETIC_MAX_ITERATIONS {
        let previous = latitude;
        let sin_lat = latitude.sin();
        let n = EQUATORIAL_RADIUS / (1.0 - ECCENTRICITY_SQUARED * sin_lat * sin_lat).sqrt();
        altitude = p / latitude.cos() - n;
        latitude = if p == 0.0 {
            0.0
        } else {
            (position.z / p).atan2(1.0 - n / (n + altitude) * ECCENTRICITY_SQUARED)
        };
        if (latitude - previous).abs() < GEODETIC_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(
            "geodetic inverse did not converge to {GEODETIC_TOLERANCE} rad within {GEODETIC_MAX_ITERATIONS} iterations; returning best estimate"
        );
    }
    (latitude, longitude, altitude)
}

/// Convert an LLD position (down positive) to Cartesian ECEF coordinates
pub fn lld_to_ecef(position: &PositionLld) -> PositionEcef {
    geodetic_to_ecef(position.latitude, position.longitude, position.altitude())
}

/// Convert a Cartesian ECEF position to LLD form (down positive)
pub fn ecef_to_lld(position: &PositionEcef) -> PositionLld {
    let (latitude, longitude, altitude) = ecef_to_geodetic(position);
    PositionLld::from_lla(latitude, longitude, altitude)
}

/// Elementary frame rotation about the x axis
pub fn rot1(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, c, s, //
        0.0, -s, c,
    )
}

/// Elementary frame rotation about the y axis
pub fn rot2(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, 0.0, -s, //
        0.0, 1.0, 0.0, //
        s, 0.0, c,
    )
}

/// Elementary frame rotation about the z axis
pub fn rot3(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, s, 0.0, //
        -s, c, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// Rotation from the ECEF frame to the local NED frame ($C_e^n$)
///
/// The NED frame is defined by the tangent to the ellipsoidal surface at the given
/// latitude and longitude. Composed from elementary rotations as
/// $C_e^n = R_2(-\pi/2 - \phi) R_3(\lambda)$, which expands to
///
/// $$
/// C_e^n = \begin{bmatrix}
/// -\sin\phi\cos\lambda & -\sin\phi\sin\lambda & \cos\phi \\\\
/// -\sin\lambda & \cos\lambda & 0 \\\\
/// -\cos\phi\cos\lambda & -\cos\phi\sin\lambda & -\sin\phi
/// \end{bmatrix}
/// $$
///
/// # Example
/// ```rust
/// use navsim::earth;
/// let c_en = earth::ecef_to_ned(45_f64.to_radians(), 90_f64.to_radians());
/// ```
pub fn ecef_to_ned(latitude: f64, longitude: f64) -> Matrix3<f64> {
    rot2(-std::f64::consts::FRAC_PI_2 - latitude) * rot3(longitude)
}

/// Rotation from the local NED frame to the ECEF frame ($C_n^e$)
pub fn ned_to_ecef(latitude: f64, longitude: f64) -> Matrix3<f64> {
    ecef_to_ned(latitude, longitude).transpose()
}

/// Rotation from the ECEF frame to the local ENU frame at an observer position
pub fn ecef_to_enu_rotation(latitude: f64, longitude: f64) -> Matrix3<f64> {
    enu_to_ecef_rotation(latitude, longitude).transpose()
}

/// Rotation from the local ENU frame to the ECEF frame at an observer position
pub fn enu_to_ecef_rotation(latitude: f64, longitude: f64) -> Matrix3<f64> {
    rot3(-(std::f64::consts::FRAC_PI_2 + longitude))
        * rot1(-(std::f64::consts::FRAC_PI_2 - latitude))
}

/// Resolve an ECEF position into ENU components local to a geodetic observer
///
/// # Parameters
/// - `position` - the ECEF point to resolve
/// - `observer` - geodetic position of the ENU origin (e.g. a ground receiver)
pub fn ecef_to_enu(position: &PositionEcef, observer: &PositionLld) -> Vector3<f64> {
    let origin = lld_to_ecef(observer);
    ecef_to_enu_rotation(observer.latitude, observer.longitude)
        * (position.as_vector() - origin.as_vector())
}

/// Convert local ENU components at a geodetic observer back to an ECEF position
pub fn enu_to_ecef(enu: &Vector3<f64>, observer: &PositionLld) -> PositionEcef {
    let origin = lld_to_ecef(observer);
    PositionEcef::from_vector(
        &(origin.as_vector() + enu_to_ecef_rotation(observer.latitude, observer.longitude) * enu),
    )
}

/// Calculate the principal radii of curvature
///
/// # Parameters
/// - `latitude` - geodetic latitude in radians
///
/// # Returns
/// A tuple `(rm, rn)` in meters where `rm` is the radius of curvature in the meridian
/// and `rn` is the prime-vertical (normal) radius of curvature at the given latitude.
///
/// # Example
/// ```rust
/// use navsim::earth;
/// let (rm, rn) = earth::principal_radii(45_f64.to_radians());
/// assert!(rn > rm);
/// ```
pub fn principal_radii(latitude: f64) -> (f64, f64) {
    let sin_lat_sq = latitude.sin() * latitude.sin();
    let aux = 1.0 - ECCENTRICITY_SQUARED * sin_lat_sq;
    let rm = EQUATORIAL_RADIUS * (1.0 - ECCENTRICITY_SQUARED) / (aux.sqrt() * aux);
    let rn = EQUATORIAL_RADIUS / aux.sqrt();
    (rm, rn)
}

/// Which frame the gravity vector is expressed with respect to.
///
/// The relation between the two is
/// $g_{eb}^e = g_{ib}^e - \Omega_{ie}^e \Omega_{ie}^e r_{eb}^e$, where the centripetal
/// term works out to $\omega_{ie}^2 (x, y, 0)^T$.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityMode {
    /// Gravity with respect to the rotating Earth frame (includes the centripetal
    /// term); this is the flavor the mechanization equations consume.
    #[default]
    Earth,
    /// Inertial gravitation (mass attraction only).
    Inertial,
}

/// Calculate the gravitational acceleration vector in ECEF coordinates
///
/// Central term $-\mu r / |r|^3$ plus the $J_2$ zonal-harmonic correction; higher
/// order harmonics are not modeled. With [`GravityMode::Earth`] the centripetal
/// acceleration of the rotating frame is added so the result is gravity with respect
/// to the Earth, $g_{eb}^e$; with [`GravityMode::Inertial`] it is the inertial
/// gravitation $g_{ib}^e$.
///
/// # Parameters
/// - `position` - ECEF position of the body
/// - `mode` - which frame the result is expressed with respect to
///
/// # Example
/// ```rust
/// use navsim::earth::{self, GravityMode};
/// let ecef = earth::geodetic_to_ecef(0.0, 0.0, 0.0);
/// let g = earth::gravitation(&ecef, GravityMode::Earth);
/// assert!((g.norm() - 9.78).abs() < 0.01);
/// ```
pub fn gravitation(position: &PositionEcef, mode: GravityMode) -> Vector3<f64> {
    let omega_sq = match mode {
        GravityMode::Earth => RATE * RATE,
        GravityMode::Inertial => 0.0,
    };
    let r = position.as_vector();
    let radius = r.norm();
    let radius_sq = radius * radius;

    let mut acceleration = -MU * r / (radius * radius_sq);

    let aux = -3.0 * J2 * MU * EQUATORIAL_RADIUS * EQUATORIAL_RADIUS
        / (2.0 * radius_sq * radius_sq * radius);
    let z_ratio = 5.0 * position.z * position.z / radius_sq;
    acceleration[0] += omega_sq * position.x + aux * (1.0 - z_ratio) * position.x;
    acceleration[1] += omega_sq * position.y + aux * (1.0 - z_ratio) * position.y;
    acceleration[2] += aux * (3.0 - z_ratio) * position.z;

    acceleration
}

/// Calculate the Earth rotation rate vector resolved in the local NED frame
///
/// $$
/// \omega_{ie}^n = \omega_{ie} \begin{bmatrix} \cos\phi \\\\ 0 \\\\ -\sin\phi \end{bmatrix}
/// $$
///
/// # Example
/// ```rust
/// use navsim::earth;
/// let omega_ie_n = earth::earth_rate_ned(45_f64.to_radians());
/// ```
pub fn earth_rate_ned(latitude: f64) -> Vector3<f64> {
    Vector3::new(RATE * latitude.cos(), 0.0, -RATE * latitude.sin())
}

/// Calculate the transport rate vector in the local NED frame
///
/// The transport rate $\omega_{en}^n$ is the rotation rate of the local navigation
/// frame with respect to the Earth, caused by motion of its origin over the curved
/// ellipsoid. With the LLD down-positive convention the effective radii are
/// `rm - down` and `rn - down`:
///
/// $$
/// \omega_{en}^n = \begin{bmatrix} v_e / (R_n - d) \\\\ -v_n / (R_m - d) \\\\ -v_e \tan\phi / (R_n - d) \end{bmatrix}
/// $$
///
/// # Parameters
/// - `velocity` - NED velocity of the body
/// - `position` - LLD position of the body
///
/// # Example
/// ```rust
/// use navsim::earth;
/// use navsim::{PositionLld, VelocityNed};
/// let velocity = VelocityNed::new(10.0, 0.0, 0.0);
/// let position = PositionLld::new(45_f64.to_radians(), 0.0, -1000.0);
/// let omega_en_n = earth::transport_rate(&velocity, &position);
/// ```
pub fn transport_rate(velocity: &VelocityNed, position: &PositionLld) -> Vector3<f64> {
    let (rm, rn) = principal_radii(position.latitude);
    let rm_effective = rm - position.down;
    let rn_effective = rn - position.down;
    Vector3::new(
        velocity.east / rn_effective,
        -velocity.north / rm_effective,
        -velocity.east * position.latitude.tan() / rn_effective,
    )
}
