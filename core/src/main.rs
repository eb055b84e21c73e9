//! NAVSIM: strapdown inertial navigation simulation and sensor emulation.
//!
//! Three modes of operation:
//!
//! - Free integration (`fi`): dead-reckon an IMU stream from an initial state and
//!   write the resulting trajectory.
//! - Sensor emulation (`emulate`): derive true IMU readouts from a reference
//!   trajectory, corrupt them (and a synthetic GPS stream) through a JSON sensor
//!   profile, and write every stream to a directory. Supports Monte-Carlo batches
//!   with per-run seeds, optionally in parallel.
//! - Process generation (`process-gen`): realize a single stochastic process and
//!   optionally print its Allan deviation for fingerprinting.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use navsim::emulation::{EmulationConfig, SensorEmulator};
use navsim::propagation::{AttitudeRepresentation, IntegrationScheme, Propagator};
use navsim::sim::{
    ImuRecord, NavigationResult, PositionForm, ReferenceOptions, VelocityFrame, load_reference,
    write_emulation_csv,
};
use navsim::stats;
use navsim::stochastic::ProcessModel;
use navsim::{EulerAngles, NavState, PositionLld, VelocityNed};
use rayon::prelude::*;
use std::error::Error;
use std::path::PathBuf;

const LONG_ABOUT: &str = "NAVSIM: strapdown inertial navigation simulation and sensor emulation.

This program integrates IMU streams into trajectories (free integration / dead
reckoning) and runs the reverse pipeline: deriving the exact IMU readouts implied
by a reference trajectory and corrupting them with realistic stochastic sensor
error models to produce synthetic gyro, accelerometer, and GPS measurement streams
for testing navigation algorithms.";

#[derive(Parser)]
#[command(author, version, about = "Strapdown INS simulation and sensor emulation tool.", long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        name = "fi",
        about = "Run free integration (dead reckoning) over an IMU stream",
        long_about = "Integrate a CSV stream of gyroscope/accelerometer samples forward from an initial state. Only inertial measurements are used; no aiding measurements are incorporated, so the solution drifts according to the sensor errors."
    )]
    FreeIntegration(FreeIntegrationArgs),

    #[command(
        name = "emulate",
        about = "Emulate an IMU/GPS sensor suite over a reference trajectory",
        long_about = "Derive the true gyroscope/accelerometer readouts implied by a reference trajectory via inverse mechanization, corrupt them through a JSON sensor-error profile, and emit true and corrupted streams plus synthetic GPS fixes. Use --runs with --parallel for Monte-Carlo batches."
    )]
    Emulate(EmulateArgs),

    #[command(
        name = "process-gen",
        about = "Generate a stochastic process realization",
        long_about = "Realize one of the canonical sensor-error processes (white noise, random constant, random walk, Gauss-Markov) and write it to CSV. With --allan, also print the Allan deviation over decade-spaced averaging intervals."
    )]
    ProcessGen(ProcessGenArgs),
}

#[derive(Args, Clone, Debug)]
struct FreeIntegrationArgs {
    /// Input CSV file with columns time,gyro_x,gyro_y,gyro_z,accel_x,accel_y,accel_z
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV file for the integrated trajectory
    #[arg(short, long)]
    output: PathBuf,

    /// Initial latitude in degrees
    #[arg(long, default_value_t = 0.0)]
    latitude: f64,

    /// Initial longitude in degrees
    #[arg(long, default_value_t = 0.0)]
    longitude: f64,

    /// Initial altitude in meters (positive upward)
    #[arg(long, default_value_t = 0.0)]
    altitude: f64,

    /// Initial NED velocity in m/s
    #[arg(long, default_value_t = 0.0)]
    velocity_north: f64,
    #[arg(long, default_value_t = 0.0)]
    velocity_east: f64,
    #[arg(long, default_value_t = 0.0)]
    velocity_down: f64,

    /// Initial attitude in degrees
    #[arg(long, default_value_t = 0.0)]
    roll: f64,
    #[arg(long, default_value_t = 0.0)]
    pitch: f64,
    #[arg(long, default_value_t = 0.0)]
    yaw: f64,

    /// Integration scheme
    #[arg(long, value_enum, default_value_t = IntegrationScheme::RungeKutta4)]
    scheme: IntegrationScheme,

    /// Attitude representation carried by the integrator
    #[arg(long, value_enum, default_value_t = AttitudeRepresentation::Euler)]
    attitude: AttitudeRepresentation,
}

#[derive(Args, Clone, Debug)]
struct EmulateArgs {
    /// Reference PVAT CSV file (time, position, velocity, attitude)
    #[arg(short, long)]
    reference: PathBuf,

    /// JSON sensor profile; a perfect (error-free) suite is assumed when omitted
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Output directory for the emitted streams
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Position convention of the reference file
    #[arg(long, value_enum, default_value_t = PositionForm::Lla)]
    position_form: PositionForm,

    /// Frame of the reference velocity columns
    #[arg(long, value_enum, default_value_t = VelocityFrame::Ned)]
    velocity_frame: VelocityFrame,

    /// Reference angles (latitude/longitude/attitude) are in degrees
    #[arg(long)]
    degrees: bool,

    /// Seed override; takes precedence over the profile seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of Monte-Carlo runs, each with a derived seed
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Run the Monte-Carlo batch on parallel workers
    #[arg(long)]
    parallel: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProcessKindArg {
    WhiteNoise,
    RandomConstant,
    RandomWalk,
    GaussMarkov,
}

#[derive(Args, Clone, Debug)]
struct ProcessGenArgs {
    /// Process kind to realize
    #[arg(long, value_enum)]
    kind: ProcessKindArg,

    /// Per-axis standard deviation
    #[arg(long, default_value_t = 1.0)]
    std: f64,

    /// Correlation time in seconds (gauss-markov only)
    #[arg(long)]
    correlation_time: Option<f64>,

    /// Number of time samples
    #[arg(long, default_value_t = 10_000)]
    samples: usize,

    /// Number of independent axes
    #[arg(long, default_value_t = 1)]
    axes: usize,

    /// Sampling frequency in Hz
    #[arg(long, default_value_t = 100.0)]
    frequency: f64,

    /// Generator seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV file for the realization
    #[arg(short, long)]
    output: PathBuf,

    /// Print the Allan deviation of the realization
    #[arg(long)]
    allan: bool,
}

fn init_logger(log_level: &str) {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{log_level}', defaulting to 'info'");
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });
    let _ = builder.try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(&cli.log_level);

    let result = match cli.command {
        Command::FreeIntegration(args) => run_free_integration(args),
        Command::Emulate(args) => run_emulate(args),
        Command::ProcessGen(args) => run_process_gen(args),
    };
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run_free_integration(args: FreeIntegrationArgs) -> Result<(), Box<dyn Error>> {
    info!("reading IMU stream from {}", args.input.display());
    let records = ImuRecord::from_csv(&args.input)?;
    info!("loaded {} samples", records.len());

    let initial = NavState::new(
        records.first().map_or(0.0, |r| r.time),
        PositionLld::from_lla(
            args.latitude.to_radians(),
            args.longitude.to_radians(),
            args.altitude,
        ),
        VelocityNed::new(args.velocity_north, args.velocity_east, args.velocity_down),
        EulerAngles::new(
            args.roll.to_radians(),
            args.pitch.to_radians(),
            args.yaw.to_radians(),
        ),
    );

    let (time, gyro, accel) = ImuRecord::to_columns(&records);
    let propagator = Propagator::new(initial, args.scheme, args.attitude)?;
    let trajectory = propagator.free_integration(&time, &gyro, &accel)?;

    let result = NavigationResult::new("Free Integration", trajectory);
    result.to_csv(&args.output)?;
    info!("wrote trajectory to {}", args.output.display());
    Ok(())
}

fn run_emulate(args: EmulateArgs) -> Result<(), Box<dyn Error>> {
    let options = ReferenceOptions {
        position_form: args.position_form,
        velocity_frame: args.velocity_frame,
        angles_in_degrees: args.degrees,
    };
    info!("reading reference trajectory from {}", args.reference.display());
    let reference = load_reference(&args.reference, options)?;
    info!("loaded {} reference epochs", reference.len());

    let mut config = match &args.profile {
        Some(path) => EmulationConfig::from_json(path)?,
        None => EmulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let base_seed = config.seed;
    let emulator = SensorEmulator::new(config)?;

    let run_once = |run: usize| -> Result<(), Box<dyn Error + Send + Sync>> {
        // well-separated per-run seeds so trials draw independent streams
        let seed = base_seed.wrapping_add(run as u64 * 0x9E37_79B9);
        let result = emulator
            .clone()
            .with_seed(seed)
            .emulate(&reference)
            .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;
        let directory = if args.runs > 1 {
            args.output_dir.join(format!("run-{run}"))
        } else {
            args.output_dir.clone()
        };
        write_emulation_csv(&result, &directory)
            .map_err(|e| -> Box<dyn Error + Send + Sync> { e.to_string().into() })?;
        info!("run {run}: wrote streams to {}", directory.display());
        Ok(())
    };

    if args.parallel && args.runs > 1 {
        (0..args.runs)
            .into_par_iter()
            .map(run_once)
            .collect::<Result<Vec<_>, Box<dyn Error + Send + Sync>>>()
            .map_err(|e| -> Box<dyn Error> { e })?;
    } else {
        for run in 0..args.runs {
            run_once(run).map_err(|e| -> Box<dyn Error> { e })?;
        }
    }
    Ok(())
}

fn run_process_gen(args: ProcessGenArgs) -> Result<(), Box<dyn Error>> {
    let std = vec![args.std];
    let spec = match args.kind {
        ProcessKindArg::WhiteNoise => ProcessModel::WhiteNoise { std },
        ProcessKindArg::RandomConstant => ProcessModel::RandomConstant { std },
        ProcessKindArg::RandomWalk => ProcessModel::RandomWalk { std },
        ProcessKindArg::GaussMarkov => ProcessModel::GaussMarkov {
            std,
            correlation_time: args.correlation_time.unwrap_or(1.0),
        },
    };
    let sampling_period = 1.0 / args.frequency;
    let mut generator = spec.build(args.samples, args.axes, args.seed)?;
    let realization = generator.compute(Some(sampling_period));

    let mut writer = csv::Writer::from_path(&args.output)?;
    let mut header = vec!["time".to_string()];
    header.extend((0..args.axes).map(|axis| format!("axis_{axis}")));
    writer.write_record(&header)?;
    for t in 0..args.samples {
        let mut row = vec![format!("{}", t as f64 * sampling_period)];
        row.extend((0..args.axes).map(|axis| format!("{}", realization[(t, axis)])));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    info!("wrote realization to {}", args.output.display());

    if args.allan {
        let (adev, taus) = stats::allan_deviation(&realization, args.frequency);
        println!("tau_s,adev");
        for (row, tau) in taus.iter().enumerate() {
            println!("{tau},{}", adev[(row, 0)]);
        }
    }
    Ok(())
}
