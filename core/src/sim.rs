//! Simulation I/O: CSV loading of sensor and reference data, result containers
//!
//! This module is the file-format collaborator around the numerical core:
//!
//! - [`ImuRecord`] reads and writes time-stamped gyro/accel streams,
//! - [`load_reference`] reads a reference PVAT (position, velocity, attitude, time)
//!   file into a [`Trajectory`], converting from whichever position form, velocity
//!   frame, and angle unit the file uses into the internal LLD/NED/radians
//!   conventions,
//! - [`NavigationResult`] stores a named navigation solution and round-trips it
//!   through CSV in user-facing units (degrees, meters),
//! - [`write_emulation_csv`] dumps the true and corrupted streams of an emulation
//!   run, one file per stream.
//!
//! Unit conversions happen at this boundary only; everything inside the core is SI
//! radians/meters/seconds.

use crate::emulation::EmulationResult;
use crate::propagation::{AttitudeRepresentation, IntegrationScheme, Propagator};
use crate::{
    EulerAngles, NavError, NavState, PositionEcef, PositionLld, Trajectory, VelocityNed, earth,
};
use clap::ValueEnum;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;

/// One row of an IMU stream file: a time stamp plus the two body-frame triads.
///
/// # Example
/// ```no_run
/// use navsim::sim::ImuRecord;
/// let records = ImuRecord::from_csv("./data/imu.csv").expect("failed to read IMU data");
/// println!("loaded {} samples", records.len());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImuRecord {
    /// Time in seconds
    pub time: f64,
    /// Angular rate, rad/s, body x/y/z
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    /// Specific force, m/s², body x/y/z
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
}

impl ImuRecord {
    /// Read an IMU stream from a CSV file with a header row.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, Box<dyn Error>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Write an IMU stream to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Split records into the parallel columns the propagator consumes.
    pub fn to_columns(records: &[Self]) -> (Vec<f64>, Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
        let time = records.iter().map(|r| r.time).collect();
        let gyro = records
            .iter()
            .map(|r| Vector3::new(r.gyro_x, r.gyro_y, r.gyro_z))
            .collect();
        let accel = records
            .iter()
            .map(|r| Vector3::new(r.accel_x, r.accel_y, r.accel_z))
            .collect();
        (time, gyro, accel)
    }
}

/// Position convention of a reference PVAT file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PositionForm {
    /// Latitude, longitude, altitude (positive upward)
    #[default]
    Lla,
    /// Latitude, longitude, down (positive downward)
    Lld,
    /// ECEF x, y, z in meters
    Ecef,
}

/// Resolution frame of the velocity columns in a reference PVAT file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VelocityFrame {
    /// NED components (internal convention; no conversion applied)
    #[default]
    Ned,
    /// ECEF components; rotated through $C_e^n$ at each row's position
    Ecef,
    /// Body components; rotated through $C_b^n$ at each row's attitude
    Body,
}

/// One row of a reference PVAT file, in the units declared by [`ReferenceOptions`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Time in seconds
    pub time: f64,
    /// First position column (latitude, or ECEF x)
    pub p1: f64,
    /// Second position column (longitude, or ECEF y)
    pub p2: f64,
    /// Third position column (altitude/down/ECEF z, meters)
    pub p3: f64,
    /// Velocity columns in the declared frame, m/s
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
    /// Attitude columns: roll, pitch, yaw
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// How to interpret the columns of a reference PVAT file.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceOptions {
    pub position_form: PositionForm,
    pub velocity_frame: VelocityFrame,
    /// Latitude/longitude and attitude columns are degrees rather than radians.
    pub angles_in_degrees: bool,
}

/// Load a reference trajectory from CSV, converting into the internal conventions.
///
/// # Example
/// ```no_run
/// use navsim::sim::{ReferenceOptions, load_reference};
/// let options = ReferenceOptions { angles_in_degrees: true, ..Default::default() };
/// let reference = load_reference("./data/ref_pvat.csv", options).expect("bad reference file");
/// ```
pub fn load_reference<P: AsRef<Path>>(
    path: P,
    options: ReferenceOptions,
) -> Result<Trajectory, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut trajectory = Trajectory::new();
    for row in reader.deserialize() {
        let record: ReferenceRecord = row?;
        trajectory.push(reference_state(&record, options));
    }
    Ok(trajectory)
}

fn reference_state(record: &ReferenceRecord, options: ReferenceOptions) -> NavState {
    let angle_scale = if options.angles_in_degrees {
        std::f64::consts::PI / 180.0
    } else {
        1.0
    };

    let position = match options.position_form {
        PositionForm::Lla => PositionLld::from_lla(
            record.p1 * angle_scale,
            record.p2 * angle_scale,
            record.p3,
        ),
        PositionForm::Lld => {
            PositionLld::new(record.p1 * angle_scale, record.p2 * angle_scale, record.p3)
        }
        PositionForm::Ecef => {
            earth::ecef_to_lld(&PositionEcef::new(record.p1, record.p2, record.p3))
        }
    };

    let attitude = EulerAngles::new(
        record.roll * angle_scale,
        record.pitch * angle_scale,
        record.yaw * angle_scale,
    );

    let raw_velocity = Vector3::new(record.v1, record.v2, record.v3);
    let velocity = match options.velocity_frame {
        VelocityFrame::Ned => raw_velocity,
        VelocityFrame::Ecef => {
            earth::ecef_to_ned(position.latitude, position.longitude) * raw_velocity
        }
        VelocityFrame::Body => {
            crate::attitude::euler_to_dcm(&attitude).transpose() * raw_velocity
        }
    };

    NavState::new(
        record.time,
        position,
        VelocityNed::from_vector(&velocity),
        attitude,
    )
}

/// One row of a navigation solution file, in user-facing units.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct NavigationRecord {
    time: f64,
    lat_deg: f64,
    lon_deg: f64,
    alt_m: f64,
    vel_n_mps: f64,
    vel_e_mps: f64,
    vel_d_mps: f64,
    roll_deg: f64,
    pitch_deg: f64,
    yaw_deg: f64,
}

/// A named navigation solution, convertible to and from CSV.
///
/// The CSV form uses degrees and altitude-positive-up so results are directly
/// plottable; the in-memory [`Trajectory`] keeps the internal radians/LLD form.
#[derive(Clone, Debug, Default)]
pub struct NavigationResult {
    pub trajectory: Trajectory,
    /// Name or identifier for this solution
    pub name: String,
}

impl NavigationResult {
    pub fn new(name: &str, trajectory: Trajectory) -> Self {
        NavigationResult {
            trajectory,
            name: name.to_string(),
        }
    }

    /// Write the solution to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::Writer::from_path(path)?;
        for state in &self.trajectory.states {
            writer.serialize(NavigationRecord {
                time: state.time,
                lat_deg: state.position.latitude.to_degrees(),
                lon_deg: state.position.longitude.to_degrees(),
                alt_m: state.position.altitude(),
                vel_n_mps: state.velocity.north,
                vel_e_mps: state.velocity.east,
                vel_d_mps: state.velocity.down,
                roll_deg: state.attitude.roll.to_degrees(),
                pitch_deg: state.attitude.pitch.to_degrees(),
                yaw_deg: state.attitude.yaw.to_degrees(),
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a solution back from a CSV file produced by [`NavigationResult::to_csv`].
    pub fn from_csv<P: AsRef<Path>>(path: P, name: &str) -> Result<Self, Box<dyn Error>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut trajectory = Trajectory::new();
        for row in reader.deserialize() {
            let record: NavigationRecord = row?;
            trajectory.push(NavState::new(
                record.time,
                PositionLld::from_lla(
                    record.lat_deg.to_radians(),
                    record.lon_deg.to_radians(),
                    record.alt_m,
                ),
                VelocityNed::new(record.vel_n_mps, record.vel_e_mps, record.vel_d_mps),
                EulerAngles::new(
                    record.roll_deg.to_radians(),
                    record.pitch_deg.to_radians(),
                    record.yaw_deg.to_radians(),
                ),
            ));
        }
        Ok(NavigationResult::new(name, trajectory))
    }
}

/// Run dead reckoning over a recorded IMU stream.
///
/// Convenience wrapper tying [`ImuRecord`] columns to
/// [`Propagator::free_integration`].
pub fn dead_reckoning(
    records: &[ImuRecord],
    initial: NavState,
    scheme: IntegrationScheme,
    representation: AttitudeRepresentation,
) -> Result<NavigationResult, NavError> {
    let (time, gyro, accel) = ImuRecord::to_columns(records);
    let propagator = Propagator::new(initial, scheme, representation)?;
    let trajectory = propagator.free_integration(&time, &gyro, &accel)?;
    Ok(NavigationResult::new("Dead Reckoning", trajectory))
}

#[derive(Clone, Copy, Debug, Serialize)]
struct VectorRecord {
    time: f64,
    x: f64,
    y: f64,
    z: f64,
}

fn write_vector_csv<P: AsRef<Path>>(
    path: P,
    time: &[f64],
    stream: &[Vector3<f64>],
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for (t, v) in time.iter().zip(stream.iter()) {
        writer.serialize(VectorRecord {
            time: *t,
            x: v[0],
            y: v[1],
            z: v[2],
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Serialize)]
struct GpsEcefRecord {
    time: f64,
    x_m: f64,
    y_m: f64,
    z_m: f64,
    vx_mps: f64,
    vy_mps: f64,
    vz_mps: f64,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct GpsNedRecord {
    time: f64,
    lat_deg: f64,
    lon_deg: f64,
    alt_m: f64,
    vel_n_mps: f64,
    vel_e_mps: f64,
    vel_d_mps: f64,
}

/// Write every stream of an emulation run into a directory.
///
/// Produces `ref_gyro.csv`, `ref_accel.csv`, `gyro.csv`, `accel.csv` (body-frame
/// triads), `gps_ecef.csv` (corrupted ECEF position + velocity) and `gps_ned.csv`
/// (corrupted geodetic position + NED velocity).
pub fn write_emulation_csv<P: AsRef<Path>>(
    result: &EmulationResult,
    directory: P,
) -> Result<(), Box<dyn Error>> {
    let directory = directory.as_ref();
    std::fs::create_dir_all(directory)?;
    write_vector_csv(directory.join("ref_gyro.csv"), &result.time, &result.true_gyro)?;
    write_vector_csv(
        directory.join("ref_accel.csv"),
        &result.time,
        &result.true_accel,
    )?;
    write_vector_csv(directory.join("gyro.csv"), &result.time, &result.gyro)?;
    write_vector_csv(directory.join("accel.csv"), &result.time, &result.accel)?;

    let mut writer = csv::Writer::from_path(directory.join("gps_ecef.csv"))?;
    for i in 0..result.time.len() {
        let p = &result.gps_position_ecef[i];
        let v = &result.gps_velocity_ecef[i];
        writer.serialize(GpsEcefRecord {
            time: result.time[i],
            x_m: p.x,
            y_m: p.y,
            z_m: p.z,
            vx_mps: v[0],
            vy_mps: v[1],
            vz_mps: v[2],
        })?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(directory.join("gps_ned.csv"))?;
    for i in 0..result.time.len() {
        let p = &result.gps_position_lld[i];
        let v = &result.gps_velocity_ned[i];
        writer.serialize(GpsNedRecord {
            time: result.time[i],
            lat_deg: p.latitude.to_degrees(),
            lon_deg: p.longitude.to_degrees(),
            alt_m: p.altitude(),
            vel_n_mps: v.north,
            vel_e_mps: v.east,
            vel_d_mps: v.down,
        })?;
    }
    writer.flush()?;
    Ok(())
}

// === Unit tests ===
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn imu_record_csv_round_trip() {
        let records = vec![
            ImuRecord {
                time: 0.0,
                gyro_x: 0.001,
                gyro_y: -0.002,
                gyro_z: 0.003,
                accel_x: 0.1,
                accel_y: 0.2,
                accel_z: -9.8,
            },
            ImuRecord {
                time: 0.01,
                gyro_x: 0.002,
                gyro_y: -0.001,
                gyro_z: 0.004,
                accel_x: 0.0,
                accel_y: 0.3,
                accel_z: -9.7,
            },
        ];
        let path = temp_path("navsim_imu_round_trip.csv");
        ImuRecord::to_csv(&records, &path).expect("failed to write CSV");
        let read = ImuRecord::from_csv(&path).expect("failed to read CSV");
        assert_eq!(read, records);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn imu_record_missing_file_errors() {
        assert!(ImuRecord::from_csv("nonexistent.csv").is_err());
    }

    #[test]
    fn reference_conversion_lla_degrees() {
        let record = ReferenceRecord {
            time: 1.0,
            p1: 45.0,
            p2: -70.0,
            p3: 150.0,
            v1: 1.0,
            v2: 2.0,
            v3: 3.0,
            roll: 10.0,
            pitch: 5.0,
            yaw: 90.0,
        };
        let options = ReferenceOptions {
            angles_in_degrees: true,
            ..Default::default()
        };
        let state = reference_state(&record, options);
        assert_approx_eq!(state.position.latitude, 45.0_f64.to_radians(), 1e-12);
        assert_approx_eq!(state.position.down, -150.0, 1e-12);
        assert_approx_eq!(state.velocity.north, 1.0, 1e-12);
        assert_approx_eq!(state.attitude.yaw, std::f64::consts::FRAC_PI_2, 1e-12);
    }

    #[test]
    fn reference_conversion_ecef_velocity() {
        // an ECEF velocity pointing along +z maps to mostly-north at the equator
        let record = ReferenceRecord {
            time: 0.0,
            p1: 0.0,
            p2: 0.0,
            p3: 0.0,
            v1: 0.0,
            v2: 0.0,
            v3: 5.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
        };
        let options = ReferenceOptions {
            position_form: PositionForm::Lla,
            velocity_frame: VelocityFrame::Ecef,
            angles_in_degrees: false,
        };
        let state = reference_state(&record, options);
        assert_approx_eq!(state.velocity.north, 5.0, 1e-9);
        assert_approx_eq!(state.velocity.east, 0.0, 1e-9);
        assert_approx_eq!(state.velocity.down, 0.0, 1e-9);
    }

    #[test]
    fn reference_conversion_body_velocity() {
        // body x velocity with a 90 degree yaw points east
        let record = ReferenceRecord {
            time: 0.0,
            p1: 0.0,
            p2: 0.0,
            p3: 0.0,
            v1: 4.0,
            v2: 0.0,
            v3: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 90.0,
        };
        let options = ReferenceOptions {
            velocity_frame: VelocityFrame::Body,
            angles_in_degrees: true,
            ..Default::default()
        };
        let state = reference_state(&record, options);
        assert_approx_eq!(state.velocity.north, 0.0, 1e-12);
        assert_approx_eq!(state.velocity.east, 4.0, 1e-12);
    }

    #[test]
    fn navigation_result_csv_round_trip() {
        let mut trajectory = Trajectory::new();
        for i in 0..3 {
            trajectory.push(NavState::new(
                i as f64,
                PositionLld::from_lla(0.7 + 1e-6 * i as f64, 0.2, 100.0 + i as f64),
                VelocityNed::new(1.0, -2.0, 0.5),
                EulerAngles::new(0.05, -0.02, 1.0),
            ));
        }
        let original = NavigationResult::new("Test Navigation", trajectory);
        let path = temp_path("navsim_nav_round_trip.csv");
        original.to_csv(&path).expect("failed to write CSV");
        let read = NavigationResult::from_csv(&path, "Read Navigation").expect("failed to read");
        assert_eq!(read.name, "Read Navigation");
        assert_eq!(read.trajectory.len(), original.trajectory.len());
        let a = &original.trajectory.states[2];
        let b = &read.trajectory.states[2];
        assert_approx_eq!(a.position.latitude, b.position.latitude, 1e-9);
        assert_approx_eq!(a.position.down, b.position.down, 1e-6);
        assert_approx_eq!(a.velocity.east, b.velocity.east, 1e-9);
        assert_approx_eq!(a.attitude.yaw, b.attitude.yaw, 1e-9);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn emulation_csv_files_exist() {
        use crate::emulation::{EmulationConfig, SensorEmulator};

        let mut trajectory = Trajectory::new();
        for i in 0..10 {
            trajectory.push(NavState::new(
                i as f64 * 0.1,
                PositionLld::new(0.6, -1.2, -300.0),
                VelocityNed::default(),
                EulerAngles::default(),
            ));
        }
        let emulator = SensorEmulator::new(EmulationConfig::default()).unwrap();
        let result = emulator.emulate(&trajectory).unwrap();
        let directory = temp_path("navsim_emulation_out");
        write_emulation_csv(&result, &directory).expect("failed to write emulation CSVs");
        for file in [
            "ref_gyro.csv",
            "ref_accel.csv",
            "gyro.csv",
            "accel.csv",
            "gps_ecef.csv",
            "gps_ned.csv",
        ] {
            assert!(directory.join(file).exists(), "{file} missing");
        }
        let _ = std::fs::remove_dir_all(&directory);
    }
}
