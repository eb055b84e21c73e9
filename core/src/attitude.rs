//! Attitude representations and conversions
//!
//! The attitude of the body frame with respect to the local NED frame is carried in
//! one of two interchangeable forms: a triplet of Euler angles (roll, pitch, yaw with
//! the conventional z-y-x rotation sequence) or the direction cosine matrix $C_n^b$
//! they generate. This module provides the conversions between the two, the angle
//! range normalization that keeps the Euler triplet canonical, and the
//! re-orthonormalization that keeps an integrated DCM on the rotation manifold.
//!
//! Pitch at ±π/2 is a genuine singularity of the Euler representation (gimbal lock):
//! [`dcm_to_euler`] restricts pitch to (−π/2, π/2) by construction and cannot recover
//! angles at the singularity itself. For near-vertical trajectories prefer the DCM
//! attitude form offered by the propagator.

use crate::{EulerAngles, wrap_to_pi};
use nalgebra::Matrix3;

/// Convert Euler angles to a direction cosine matrix
///
/// Returns the coordinate transformation matrix from the NED frame to the body frame,
/// $C_n^b$, under the z-y-x rotation sequence (yaw, then pitch, then roll), equal to
/// the product `rot1(roll) * rot2(pitch) * rot3(yaw)`:
///
/// $$
/// C_n^b = \begin{bmatrix}
/// c_\theta c_\psi & c_\theta s_\psi & -s_\theta \\\\
/// s_\phi s_\theta c_\psi - c_\phi s_\psi & s_\phi s_\theta s_\psi + c_\phi c_\psi & c_\theta s_\phi \\\\
/// c_\phi s_\theta c_\psi + s_\phi s_\psi & c_\phi s_\theta s_\psi - s_\phi c_\psi & c_\theta c_\phi
/// \end{bmatrix}
/// $$
///
/// The inverse transformation (body to NED) is the transpose.
///
/// # Example
/// ```rust
/// use navsim::EulerAngles;
/// use navsim::attitude::euler_to_dcm;
/// let c_nb = euler_to_dcm(&EulerAngles::new(0.0, 0.0, 0.0));
/// assert_eq!(c_nb, nalgebra::Matrix3::identity());
/// ```
pub fn euler_to_dcm(angles: &EulerAngles) -> Matrix3<f64> {
    let (sin_roll, cos_roll) = angles.roll.sin_cos();
    let (sin_pitch, cos_pitch) = angles.pitch.sin_cos();
    let (sin_yaw, cos_yaw) = angles.yaw.sin_cos();

    Matrix3::new(
        cos_pitch * cos_yaw,
        cos_pitch * sin_yaw,
        -sin_pitch,
        sin_roll * sin_pitch * cos_yaw - cos_roll * sin_yaw,
        sin_roll * sin_pitch * sin_yaw + cos_roll * cos_yaw,
        cos_pitch * sin_roll,
        cos_roll * sin_pitch * cos_yaw + sin_roll * sin_yaw,
        cos_roll * sin_pitch * sin_yaw - sin_roll * cos_yaw,
        cos_pitch * cos_roll,
    )
}

/// Convert a direction cosine matrix to Euler angles
///
/// The matrix is interpreted as the NED-to-body transformation $C_n^b$ produced by
/// [`euler_to_dcm`]. Pitch is restricted to (−π/2, π/2) by construction; at the
/// gimbal-lock singularity (pitch = ±π/2) roll and yaw are not separately observable
/// and the returned split between them is arbitrary.
///
/// The asin argument is clamped to [−1, 1] so that floating-point roundoff in a
/// nearly-orthonormal matrix cannot produce a NaN pitch.
pub fn dcm_to_euler(dcm: &Matrix3<f64>) -> EulerAngles {
    EulerAngles {
        roll: dcm[(1, 2)].atan2(dcm[(2, 2)]),
        pitch: (-dcm[(0, 2)]).clamp(-1.0, 1.0).asin(),
        yaw: dcm[(0, 1)].atan2(dcm[(0, 0)]),
    }
}

/// Normalize an Euler triplet to its canonical ranges
///
/// For the 3-2-1 rotation sequence the canonical ranges are roll and yaw in (−π, π]
/// and pitch in [−π/2, π/2]. When the raw pitch overflows its range it is folded back
/// with compensating ±π shifts applied to roll and yaw, so the normalized triplet
/// describes the same physical rotation:
///
/// ```rust
/// use navsim::EulerAngles;
/// use navsim::attitude::{euler_to_dcm, normalize_euler};
/// let raw = EulerAngles::new(0.1, 2.0, -0.4); // pitch beyond π/2
/// let canonical = normalize_euler(&raw);
/// assert!(canonical.pitch.abs() <= std::f64::consts::FRAC_PI_2);
/// let difference = euler_to_dcm(&raw) - euler_to_dcm(&canonical);
/// assert!(difference.norm() < 1e-12);
/// ```
pub fn normalize_euler(angles: &EulerAngles) -> EulerAngles {
    let half_pi = std::f64::consts::FRAC_PI_2;
    let mut roll = angles.roll;
    let mut pitch = wrap_to_pi(angles.pitch);
    let mut yaw = angles.yaw;

    if pitch > half_pi {
        pitch = std::f64::consts::PI - pitch;
        roll += std::f64::consts::PI;
        yaw += std::f64::consts::PI;
    } else if pitch < -half_pi {
        pitch = -std::f64::consts::PI - pitch;
        roll += std::f64::consts::PI;
        yaw += std::f64::consts::PI;
    }

    EulerAngles {
        roll: wrap_to_pi(roll),
        pitch,
        yaw: wrap_to_pi(yaw),
    }
}

/// Project a nearly-orthonormal matrix back onto the rotation manifold
///
/// Numerical integration of the DCM differential equation drifts the matrix off the
/// orthonormal manifold one roundoff at a time. This returns the nearest orthogonal
/// matrix, the polar factor $C (C^T C)^{-1/2}$, computed with the Newton iteration
/// for the inverse matrix square root:
///
/// $$
/// C_{k+1} = C_k \left( \tfrac{3}{2} I - \tfrac{1}{2} C_k^T C_k \right)
/// $$
///
/// The iteration converges quadratically for inputs with $\lVert C^T C - I \rVert < 1$,
/// which covers any matrix produced by a sane integration step; a handful of sweeps
/// reaches machine precision.
///
/// # Example
/// ```rust
/// use navsim::EulerAngles;
/// use navsim::attitude::{euler_to_dcm, orthonormalize};
/// let drifted = euler_to_dcm(&EulerAngles::new(0.3, -0.2, 1.0)) * 1.000001;
/// let repaired = orthonormalize(&drifted);
/// let gram = repaired.transpose() * repaired;
/// assert!((gram - nalgebra::Matrix3::identity()).norm() < 1e-12);
/// ```
pub fn orthonormalize(dcm: &Matrix3<f64>) -> Matrix3<f64> {
    let mut c = *dcm;
    for _ in 0..4 {
        let gram = c.transpose() * c;
        c *= Matrix3::identity() * 1.5 - gram * 0.5;
    }
    c
}

// === Unit tests ===
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_angles_eq(a: &EulerAngles, b: &EulerAngles, tolerance: f64) {
        assert_approx_eq!(a.roll, b.roll, tolerance);
        assert_approx_eq!(a.pitch, b.pitch, tolerance);
        assert_approx_eq!(a.yaw, b.yaw, tolerance);
    }

    #[test]
    fn identity_for_zero_angles() {
        let dcm = euler_to_dcm(&EulerAngles::default());
        assert_eq!(dcm, Matrix3::identity());
    }

    #[test]
    fn dcm_is_orthonormal() {
        let dcm = euler_to_dcm(&EulerAngles::new(0.3, -0.7, 2.1));
        let gram = dcm.transpose() * dcm;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_approx_eq!(gram[(i, j)], expected, 1e-12);
            }
        }
        assert_approx_eq!(dcm.determinant(), 1.0, 1e-12);
    }

    #[test]
    fn euler_dcm_round_trip() {
        let cases = [
            EulerAngles::new(0.0, 0.0, 0.0),
            EulerAngles::new(0.1, 0.2, 0.3),
            EulerAngles::new(-1.2, 0.4, -2.9),
            EulerAngles::new(3.0, -1.4, 0.0),
            EulerAngles::new(0.0, 1.45, -3.0),
        ];
        for angles in cases {
            let recovered = dcm_to_euler(&euler_to_dcm(&angles));
            assert_angles_eq(&recovered, &normalize_euler(&angles), 1e-10);
        }
    }

    #[test]
    fn yaw_rotation_maps_north_to_body_x() {
        // heading 90 deg: body x axis points east
        let dcm = euler_to_dcm(&EulerAngles::new(0.0, 0.0, FRAC_PI_2));
        let north = nalgebra::Vector3::new(1.0, 0.0, 0.0);
        let body = dcm * north;
        assert_approx_eq!(body[0], 0.0, 1e-12);
        assert_approx_eq!(body[1], -1.0, 1e-12);
        assert_approx_eq!(body[2], 0.0, 1e-12);
    }

    #[test]
    fn normalize_euler_passthrough_in_range() {
        let angles = EulerAngles::new(-0.5, 0.2, 3.0);
        assert_angles_eq(&normalize_euler(&angles), &angles, 1e-15);
    }

    #[test]
    fn normalize_euler_folds_pitch() {
        let folded = normalize_euler(&EulerAngles::new(0.0, 2.0, 0.0));
        assert_approx_eq!(folded.pitch, PI - 2.0, 1e-12);
        assert_approx_eq!(folded.roll, PI, 1e-12);
        assert_approx_eq!(folded.yaw, PI, 1e-12);

        let folded = normalize_euler(&EulerAngles::new(0.5, -2.0, 1.0));
        assert_approx_eq!(folded.pitch, -PI + 2.0, 1e-12);
        assert_approx_eq!(folded.roll, 0.5 - PI, 1e-12);
        assert_approx_eq!(folded.yaw, 1.0 - PI, 1e-12);
    }

    #[test]
    fn normalize_preserves_rotation() {
        for angles in [
            EulerAngles::new(0.3, 2.5, -1.0),
            EulerAngles::new(-2.0, -1.9, 4.0),
            EulerAngles::new(7.0, 0.1, -9.0),
        ] {
            let difference = euler_to_dcm(&angles) - euler_to_dcm(&normalize_euler(&angles));
            assert!(difference.norm() < 1e-12);
        }
    }

    #[test]
    fn orthonormalize_restores_scaled_rotation() {
        let rotation = euler_to_dcm(&EulerAngles::new(0.4, -0.3, 1.7));
        let drifted = rotation * 1.0001;
        let repaired = orthonormalize(&drifted);
        let difference = repaired - rotation;
        assert!(difference.norm() < 1e-10);
    }

    #[test]
    fn orthonormalize_is_idempotent_on_rotations() {
        let rotation = euler_to_dcm(&EulerAngles::new(-0.8, 0.6, 0.2));
        let repaired = orthonormalize(&rotation);
        assert!((repaired - rotation).norm() < 1e-14);
    }
}
