use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use linux_embedded_hal::I2cdev;

use imu_capture::driver::{DriverConfig, Mpu6050};

const SAMPLES: usize = 500;

/// Averages raw readings while the sensor sits still and prints suggested
/// bias flags for the capture binary. Nothing is written to disk.
fn main() -> Result<()> {
    println!("MPU-6050 Bias Estimation");
    println!("========================\n");
    println!("Keep the sensor completely still on a flat surface.");
    println!("Collecting {} samples...\n", SAMPLES);

    let config = DriverConfig::default();
    let i2c = I2cdev::new("/dev/i2c-1").context("Failed to open /dev/i2c-1")?;
    let mut imu = Mpu6050::new(i2c, config).context("Failed to initialize MPU-6050")?;

    let mut accel_sums = [0i64; 3];
    let mut gyro_sums = [0i64; 3];
    for i in 0..SAMPLES {
        let raw = imu.read_axes()?;
        for axis in 0..3 {
            accel_sums[axis] += raw.accel[axis] as i64;
            gyro_sums[axis] += raw.gyro[axis] as i64;
        }
        if (i + 1) % 100 == 0 {
            println!("  {}/{}", i + 1, SAMPLES);
        }
        thread::sleep(Duration::from_millis(5));
    }

    let mean = |sum: i64| (sum / SAMPLES as i64) as i32;
    let accel_mean = [mean(accel_sums[0]), mean(accel_sums[1]), mean(accel_sums[2])];
    let gyro_mean = [mean(gyro_sums[0]), mean(gyro_sums[1]), mean(gyro_sums[2])];

    // At rest the Z axis carries gravity; only the excess over 1 g is bias.
    let one_g = config.accel_range.lsb_per_g() as i32;
    let accel_z_bias = accel_mean[2] - one_g;

    println!("\nMeasured rest averages (LSB):");
    println!(
        "  accel: x={} y={} z={} (z includes {} LSB of gravity at this range)",
        accel_mean[0], accel_mean[1], accel_mean[2], one_g
    );
    println!("  gyro:  x={} y={} z={}", gyro_mean[0], gyro_mean[1], gyro_mean[2]);

    println!("\nSuggested capture flags:");
    println!(
        "  --accel-bias-x {} --accel-bias-y {} --accel-bias-z {} \\",
        accel_mean[0], accel_mean[1], accel_z_bias
    );
    println!(
        "  --gyro-bias-x {} --gyro-bias-y {} --gyro-bias-z {}",
        gyro_mean[0], gyro_mean[1], gyro_mean[2]
    );
    Ok(())
}
