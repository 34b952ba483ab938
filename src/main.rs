use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use linux_embedded_hal::I2cdev;

use imu_capture::calibration::{AxisCalibration, CalibrationSet};
use imu_capture::driver::{AccelRange, DriverConfig, GyroRange, Mpu6050};
use imu_capture::sampler::{FilterParams, Sampler, SamplerConfig};
use imu_capture::sink::CsvSink;

/// MPU-6050 capture: acquire, calibrate, filter, and log motion data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// I2C bus device
    #[arg(long, default_value = "/dev/i2c-1")]
    bus: String,

    /// Run duration in seconds
    #[arg(short, long, default_value_t = 30.0)]
    duration: f64,

    /// Inter-sample delay in seconds
    #[arg(short, long, default_value_t = 0.01)]
    period: f64,

    /// Sample-rate divider register value (output rate = 1 kHz / (1 + div))
    #[arg(long, default_value_t = 0x07)]
    sample_rate_div: u8,

    /// Digital low-pass filter bandwidth register value
    #[arg(long, default_value_t = 0x06)]
    dlpf: u8,

    /// Gyroscope full-scale range in degrees/second (250, 500, 1000, 2000)
    #[arg(long, default_value_t = 1000)]
    gyro_range: u16,

    /// Accelerometer full-scale range in g (2, 4, 8, 16)
    #[arg(long, default_value_t = 8)]
    accel_range: u8,

    /// Accelerometer filter window size
    #[arg(long, default_value_t = 10)]
    accel_window: usize,

    /// Accelerometer spike threshold (LSB)
    #[arg(long, default_value_t = 100.0)]
    accel_threshold: f64,

    /// Gyroscope filter window size
    #[arg(long, default_value_t = 15)]
    gyro_window: usize,

    /// Gyroscope spike threshold (LSB)
    #[arg(long, default_value_t = 50.0)]
    gyro_threshold: f64,

    /// Accelerometer bias per axis (LSB), from the estimate-bias tool
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    accel_bias_x: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    accel_bias_y: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    accel_bias_z: i32,

    /// Gyroscope bias per axis (LSB), from the estimate-bias tool
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    gyro_bias_x: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    gyro_bias_y: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    gyro_bias_z: i32,

    /// Scale applied to all accelerometer axes after bias removal
    #[arg(long, default_value_t = 1.0)]
    accel_scale: f64,

    /// Scale applied to all gyroscope axes after bias removal
    #[arg(long, default_value_t = 1.0)]
    gyro_scale: f64,

    /// Enable complementary roll fusion with this coefficient (0..=1)
    #[arg(long)]
    fusion_alpha: Option<f64>,

    /// Accelerometer output file
    #[arg(long, default_value = "accelerometer_data.csv")]
    accel_out: String,

    /// Gyroscope output file
    #[arg(long, default_value = "gyroscope_data.csv")]
    gyro_out: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    ensure!(args.duration > 0.0, "duration must be positive");
    ensure!(args.period > 0.0, "period must be positive");

    let driver_config = DriverConfig {
        sample_rate_div: args.sample_rate_div,
        dlpf: args.dlpf,
        gyro_range: GyroRange::from_dps(args.gyro_range)
            .with_context(|| format!("Unsupported gyro range: {} deg/s", args.gyro_range))?,
        accel_range: AccelRange::from_g(args.accel_range)
            .with_context(|| format!("Unsupported accel range: {} g", args.accel_range))?,
        ..DriverConfig::default()
    };

    let i2c = I2cdev::new(&args.bus)
        .with_context(|| format!("Failed to open I2C device: {}", args.bus))?;
    let driver = Mpu6050::new(i2c, driver_config).context("Failed to initialize MPU-6050")?;
    println!("✓ MPU-6050 initialized on {}", args.bus);

    let calibration = CalibrationSet {
        accel: [
            AxisCalibration::new(args.accel_bias_x, args.accel_scale),
            AxisCalibration::new(args.accel_bias_y, args.accel_scale),
            AxisCalibration::new(args.accel_bias_z, args.accel_scale),
        ],
        gyro: [
            AxisCalibration::new(args.gyro_bias_x, args.gyro_scale),
            AxisCalibration::new(args.gyro_bias_y, args.gyro_scale),
            AxisCalibration::new(args.gyro_bias_z, args.gyro_scale),
        ],
    };

    let sampler_config = SamplerConfig {
        duration: Duration::from_secs_f64(args.duration),
        period: Duration::from_secs_f64(args.period),
        accel_filter: FilterParams {
            window: args.accel_window,
            threshold: args.accel_threshold,
        },
        gyro_filter: FilterParams {
            window: args.gyro_window,
            threshold: args.gyro_threshold,
        },
        fusion_alpha: args.fusion_alpha,
    };
    let mut sampler = Sampler::new(driver, calibration, sampler_config)?;

    let mut sink = CsvSink::create(&args.accel_out, &args.gyro_out)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, stopping...");
        stop_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let emitted = sampler.run(&mut sink, stop).await?;

    println!(
        "Data collection complete: {} records in {} and {}",
        emitted, args.accel_out, args.gyro_out
    );
    Ok(())
}
