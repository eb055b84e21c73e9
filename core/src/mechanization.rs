//! Strapdown mechanization equations in the local navigation frame
//!
//! This module contains the kinematic relations between body-frame angular rate and
//! specific force on one side, and the rates of change of the LLD position, NED
//! velocity, and attitude on the other. They correspond to the local-navigation-frame
//! equations of Chapter 5.4 of Groves, _Principles of GNSS, Inertial, and Multisensor
//! Integrated Navigation Systems, 2nd Edition_.
//!
//! The equations come in two algebraically dual directions that share the same rate
//! and skew-symmetric helpers:
//!
//! - **Inverse mechanization** ([`imu_readouts`]) solves for the sensor readouts a
//!   perfect IMU would have produced on a known (reference) trajectory:
//!   $\omega_{ib}^b = C_n^b (\omega_{ie}^n + \omega_{en}^n) + \omega_{nb}^b$ and
//!   $f_{ib}^b = C_n^b (\dot{v}\_{eb}^n - C_e^n g_{eb}^e + (\Omega_{en}^n + 2\Omega_{ie}^n) v_{eb}^n)$.
//!   This is the first stage of sensor emulation.
//! - **Forward mechanization** ([`nav_rates`]) solves the same equations for the
//!   state rates given the readouts; the propagator integrates these rates in time.
//!
//! All functions here are pure: they operate on a single epoch and keep no state.

use crate::attitude::euler_to_dcm;
use crate::earth::{self, GravityMode, vector_to_skew_symmetric};
use crate::{EulerAngles, ImuReadout, NavError, PositionLld, VelocityNed};
use nalgebra::{Matrix3, Vector3};

/// Smallest |cos(latitude)| the position-rate and transport-rate denominators accept.
///
/// At the geographic poles the longitude rate is undefined and the mechanization
/// equations degenerate; rather than silently producing inf/NaN the epoch is rejected
/// with [`NavError::NumericalDegeneracy`].
pub const LATITUDE_COSINE_FLOOR: f64 = 1e-12;

fn check_latitude(position: &PositionLld) -> Result<(), NavError> {
    if position.latitude.cos().abs() < LATITUDE_COSINE_FLOOR {
        return Err(NavError::NumericalDegeneracy {
            epoch: 0,
            message: format!(
                "cos(latitude) vanishes at latitude {:.9} rad; the NED mechanization is singular at the poles",
                position.latitude
            ),
        });
    }
    Ok(())
}

/// Attitude portion of the navigation state, in either of its two forms.
///
/// The two forms describe the same rotation; which one the propagator carries decides
/// which branch of the attitude differential equation is integrated.
#[derive(Clone, Copy, Debug)]
pub enum AttitudeState {
    /// Euler angles (roll, pitch, yaw), z-y-x order
    Euler(EulerAngles),
    /// Direction cosine matrix $C_b^n$ (body to NED)
    Dcm(Matrix3<f64>),
}

impl AttitudeState {
    /// The body-to-NED transformation $C_b^n$ for this attitude.
    pub fn c_bn(&self) -> Matrix3<f64> {
        match self {
            AttitudeState::Euler(angles) => euler_to_dcm(angles).transpose(),
            AttitudeState::Dcm(c_bn) => *c_bn,
        }
    }

    /// The NED-to-body transformation $C_n^b$ for this attitude.
    pub fn c_nb(&self) -> Matrix3<f64> {
        self.c_bn().transpose()
    }
}

/// Time derivative of the attitude state, in the carrier matching its representation.
#[derive(Clone, Copy, Debug)]
pub enum AttitudeRate {
    /// Euler angle rates (roll, pitch, yaw), rad/s
    Euler(Vector3<f64>),
    /// Direction cosine matrix derivative $\dot{C}_b^n$
    Dcm(Matrix3<f64>),
}

/// Rates of change of the navigation state at one epoch.
#[derive(Clone, Copy, Debug)]
pub struct NavRates {
    /// LLD position rate: (latitude rate, longitude rate, down rate) in rad/s, rad/s, m/s
    pub position: Vector3<f64>,
    /// NED velocity rate in m/s²
    pub velocity: Vector3<f64>,
    /// Attitude rate in the representation of the input attitude
    pub attitude: AttitudeRate,
}

/// Convert Euler angle rates to the body-frame angular rate $\omega_{nb}^b$
///
/// Kinematic relation between the z-y-x Euler angle derivatives and the angular rate
/// of the body frame with respect to the navigation frame, resolved in body axes:
///
/// $$
/// \omega_{nb}^b = \begin{bmatrix}
/// \dot\phi - \dot\psi \sin\theta \\\\
/// \dot\theta \cos\phi + \dot\psi \cos\theta \sin\phi \\\\
/// \dot\psi \cos\phi \cos\theta - \dot\theta \sin\phi
/// \end{bmatrix}
/// $$
pub fn body_rate_from_euler_rate(euler_rate: &Vector3<f64>, euler: &EulerAngles) -> Vector3<f64> {
    let (sin_roll, cos_roll) = euler.roll.sin_cos();
    let (sin_pitch, cos_pitch) = euler.pitch.sin_cos();
    let (roll_rate, pitch_rate, yaw_rate) = (euler_rate[0], euler_rate[1], euler_rate[2]);

    Vector3::new(
        roll_rate - yaw_rate * sin_pitch,
        pitch_rate * cos_roll + yaw_rate * cos_pitch * sin_roll,
        yaw_rate * cos_roll * cos_pitch - pitch_rate * sin_roll,
    )
}

/// Convert the body-frame angular rate $\omega_{nb}^b$ to Euler angle rates
///
/// Inverse of [`body_rate_from_euler_rate`]. Singular at pitch = ±π/2 (gimbal lock),
/// where the division by cos(pitch) blows up; this is a genuine limitation of the
/// Euler representation, not of the implementation — carry the attitude as a DCM for
/// trajectories that approach the vertical.
pub fn euler_rate_from_body_rate(w_nb_b: &Vector3<f64>, euler: &EulerAngles) -> Vector3<f64> {
    let (sin_roll, cos_roll) = euler.roll.sin_cos();
    let tilted = w_nb_b[1] * sin_roll + w_nb_b[2] * cos_roll;

    Vector3::new(
        tilted * euler.pitch.tan() + w_nb_b[0],
        w_nb_b[1] * cos_roll - w_nb_b[2] * sin_roll,
        tilted / euler.pitch.cos(),
    )
}

/// Inverse mechanization: the exact IMU readouts consistent with a reference state
///
/// Given one epoch of a reference trajectory — LLD position, NED velocity, Euler
/// attitude — together with the finite-differenced velocity and attitude rates, this
/// computes the gyroscope and accelerometer readouts a perfect strapdown IMU would
/// have reported:
///
/// - gyro: $\omega_{ib}^b = C_n^b (\omega_{ie}^n + \omega_{en}^n) + \omega_{nb}^b$
/// - accel: $f_{ib}^b = C_n^b \left( \dot{v}\_{eb}^n - C_e^n g_{eb}^e + (\Omega_{en}^n + 2 \Omega_{ie}^n) v_{eb}^n \right)$
///
/// # Errors
/// [`NavError::NumericalDegeneracy`] when the latitude sits on a pole.
pub fn imu_readouts(
    position: &PositionLld,
    velocity: &VelocityNed,
    attitude: &EulerAngles,
    velocity_rate: &Vector3<f64>,
    euler_rate: &Vector3<f64>,
) -> Result<ImuReadout, NavError> {
    check_latitude(position)?;

    let c_nb = euler_to_dcm(attitude);
    let c_en = earth::ecef_to_ned(position.latitude, position.longitude);

    let w_nb_b = body_rate_from_euler_rate(euler_rate, attitude);
    let w_ie_n = earth::earth_rate_ned(position.latitude);
    let w_en_n = earth::transport_rate(velocity, position);
    let g_e = earth::gravitation(&earth::lld_to_ecef(position), GravityMode::Earth);

    let gyro = c_nb * (w_ie_n + w_en_n) + w_nb_b;

    let coriolis =
        vector_to_skew_symmetric(&w_en_n) + 2.0 * vector_to_skew_symmetric(&w_ie_n);
    let f_ib_n = velocity_rate - c_en * g_e + coriolis * velocity.as_vector();
    let accel = c_nb * f_ib_n;

    Ok(ImuReadout::from_vectors(gyro, accel))
}

/// Forward mechanization: the navigation state rates produced by a pair of readouts
///
/// Solves the same physical model as [`imu_readouts`] for the rates:
///
/// - velocity: $\dot{v}\_{eb}^n = C_b^n f_{ib}^b + g_{eb}^n - (\Omega_{en}^n + 2 \Omega_{ie}^n) v_{eb}^n$
/// - position: $\dot{p} = \left( v_n / (R_m - d),\ v_e / ((R_n - d) \cos\phi),\ v_d \right)$
/// - attitude, Euler branch: the Euler rate of $\omega_{nb}^b = \omega_{ib}^b - C_n^b (\omega_{en}^n + \omega_{ie}^n)$
/// - attitude, DCM branch: $\dot{C}\_b^n = C_b^n \Omega_{ib}^b - (\Omega_{ie}^n + \Omega_{en}^n) C_b^n$
///
/// # Errors
/// [`NavError::NumericalDegeneracy`] when the latitude sits on a pole (the longitude
/// rate denominator vanishes).
pub fn nav_rates(
    readout: &ImuReadout,
    position: &PositionLld,
    velocity: &VelocityNed,
    attitude: &AttitudeState,
) -> Result<NavRates, NavError> {
    check_latitude(position)?;

    let c_bn = attitude.c_bn();
    let c_en = earth::ecef_to_ned(position.latitude, position.longitude);

    let w_ie_n = earth::earth_rate_ned(position.latitude);
    let w_en_n = earth::transport_rate(velocity, position);
    let g_n = c_en * earth::gravitation(&earth::lld_to_ecef(position), GravityMode::Earth);

    let coriolis =
        vector_to_skew_symmetric(&w_en_n) + 2.0 * vector_to_skew_symmetric(&w_ie_n);
    let velocity_rate = c_bn * readout.accel + g_n - coriolis * velocity.as_vector();

    let (rm, rn) = earth::principal_radii(position.latitude);
    let rm_effective = rm - position.down;
    let rn_effective = rn - position.down;
    let position_rate = Vector3::new(
        velocity.north / rm_effective,
        velocity.east / (rn_effective * position.latitude.cos()),
        velocity.down,
    );

    let attitude_rate = match attitude {
        AttitudeState::Euler(euler) => {
            let w_nb_b = readout.gyro - c_bn.transpose() * (w_en_n + w_ie_n);
            AttitudeRate::Euler(euler_rate_from_body_rate(&w_nb_b, euler))
        }
        AttitudeState::Dcm(c) => {
            let omega_ib_b = vector_to_skew_symmetric(&readout.gyro);
            let omega_in_n =
                vector_to_skew_symmetric(&w_ie_n) + vector_to_skew_symmetric(&w_en_n);
            AttitudeRate::Dcm(c * omega_ib_b - omega_in_n * c)
        }
    };

    Ok(NavRates {
        position: position_rate,
        velocity: velocity_rate,
        attitude: attitude_rate,
    })
}

// === Unit tests ===
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn euler_rate_round_trip() {
        let euler = EulerAngles::new(0.3, -0.5, 1.2);
        let euler_rate = Vector3::new(0.01, -0.02, 0.05);
        let w_nb_b = body_rate_from_euler_rate(&euler_rate, &euler);
        let recovered = euler_rate_from_body_rate(&w_nb_b, &euler);
        for i in 0..3 {
            assert_approx_eq!(recovered[i], euler_rate[i], 1e-12);
        }
    }

    #[test]
    fn body_rate_identity_at_zero_attitude() {
        // at zero attitude the Euler rates and the body rates coincide
        let euler_rate = Vector3::new(0.1, 0.2, 0.3);
        let w_nb_b = body_rate_from_euler_rate(&euler_rate, &EulerAngles::default());
        for i in 0..3 {
            assert_approx_eq!(w_nb_b[i], euler_rate[i], 1e-12);
        }
    }

    fn static_equator_readout() -> (PositionLld, VelocityNed, EulerAngles, ImuReadout) {
        let position = PositionLld::default();
        let velocity = VelocityNed::default();
        let attitude = EulerAngles::default();
        let readout = imu_readouts(
            &position,
            &velocity,
            &attitude,
            &Vector3::zeros(),
            &Vector3::zeros(),
        )
        .unwrap();
        (position, velocity, attitude, readout)
    }

    #[test]
    fn static_body_readouts() {
        let (_, _, _, readout) = static_equator_readout();
        // gyro senses exactly the Earth rate (horizontal at the equator)
        assert_approx_eq!(readout.gyro[0], earth::RATE, 1e-12);
        assert_approx_eq!(readout.gyro[1], 0.0, 1e-12);
        assert_approx_eq!(readout.gyro[2], 0.0, 1e-12);
        // accel opposes local gravity along the down axis
        assert_approx_eq!(readout.accel[0], 0.0, 1e-9);
        assert_approx_eq!(readout.accel[1], 0.0, 1e-9);
        assert_approx_eq!(readout.accel[2], -9.78, 1e-2);
    }

    #[test]
    fn static_body_rates_are_zero() {
        let (position, velocity, attitude, readout) = static_equator_readout();
        let rates = nav_rates(
            &readout,
            &position,
            &velocity,
            &AttitudeState::Euler(attitude),
        )
        .unwrap();
        for i in 0..3 {
            assert_approx_eq!(rates.position[i], 0.0, 1e-15);
            assert_approx_eq!(rates.velocity[i], 0.0, 1e-9);
        }
        match rates.attitude {
            AttitudeRate::Euler(euler_rate) => {
                for i in 0..3 {
                    assert_approx_eq!(euler_rate[i], 0.0, 1e-15);
                }
            }
            AttitudeRate::Dcm(_) => panic!("expected Euler attitude rate"),
        }
    }

    #[test]
    fn single_epoch_round_trip() {
        // inverse then forward mechanization reproduces the reference rates exactly
        let position = PositionLld::new(0.6, -1.9, -800.0);
        let velocity = VelocityNed::new(12.0, -3.0, 0.4);
        let attitude = EulerAngles::new(0.05, -0.1, 2.4);
        let velocity_rate = Vector3::new(0.2, 0.1, -0.05);
        let euler_rate = Vector3::new(0.002, -0.001, 0.01);

        let readout =
            imu_readouts(&position, &velocity, &attitude, &velocity_rate, &euler_rate).unwrap();
        let rates = nav_rates(
            &readout,
            &position,
            &velocity,
            &AttitudeState::Euler(attitude),
        )
        .unwrap();

        for i in 0..3 {
            assert_approx_eq!(rates.velocity[i], velocity_rate[i], 1e-10);
        }
        match rates.attitude {
            AttitudeRate::Euler(recovered) => {
                for i in 0..3 {
                    assert_approx_eq!(recovered[i], euler_rate[i], 1e-10);
                }
            }
            AttitudeRate::Dcm(_) => panic!("expected Euler attitude rate"),
        }
    }

    #[test]
    fn dcm_rate_matches_euler_rate() {
        // the two attitude branches describe the same rotation rate
        let position = PositionLld::new(0.4, 0.9, 0.0);
        let velocity = VelocityNed::new(5.0, 5.0, 0.0);
        let euler = EulerAngles::new(0.1, 0.2, -0.3);
        let readout = ImuReadout::from_vectors(
            Vector3::new(0.01, -0.02, 0.03),
            Vector3::new(0.1, 0.0, -9.8),
        );

        let euler_branch = nav_rates(
            &readout,
            &position,
            &velocity,
            &AttitudeState::Euler(euler),
        )
        .unwrap();
        let c_bn = AttitudeState::Euler(euler).c_bn();
        let dcm_branch = nav_rates(
            &readout,
            &position,
            &velocity,
            &AttitudeState::Dcm(c_bn),
        )
        .unwrap();

        let euler_rate = match euler_branch.attitude {
            AttitudeRate::Euler(r) => r,
            AttitudeRate::Dcm(_) => unreachable!(),
        };
        let c_dot = match dcm_branch.attitude {
            AttitudeRate::Dcm(m) => m,
            AttitudeRate::Euler(_) => unreachable!(),
        };

        // advance both by a small dt and compare the resulting attitudes
        let dt = 1e-6;
        let advanced_euler = EulerAngles::from_vector(&(euler.as_vector() + euler_rate * dt));
        let advanced_dcm = c_bn + c_dot * dt;
        let difference = AttitudeState::Euler(advanced_euler).c_bn() - advanced_dcm;
        assert!(difference.norm() < 1e-10);
    }

    #[test]
    fn polar_latitude_is_degenerate() {
        let position = PositionLld::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0);
        let result = nav_rates(
            &ImuReadout::new(),
            &position,
            &VelocityNed::default(),
            &AttitudeState::Euler(EulerAngles::default()),
        );
        assert!(matches!(
            result,
            Err(NavError::NumericalDegeneracy { .. })
        ));
    }
}
