use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use linux_embedded_hal::I2cdev;

use imu_capture::driver::{DriverConfig, Mpu6050};

/// Live console readout of scaled sensor values, for wiring checks.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("MPU-6050 Live Readout");
    println!("=====================\n");

    let config = DriverConfig::default();
    let i2c = I2cdev::new("/dev/i2c-1").context("Failed to open /dev/i2c-1")?;
    let mut imu = Mpu6050::new(i2c, config).context("Failed to initialize MPU-6050")?;
    println!("✓ MPU-6050 initialized\n");

    println!(
        "{:>10} {:>10} {:>10} | {:>8} {:>8} {:>8}",
        "Gyro X", "Gyro Y", "Gyro Z", "Accel X", "Accel Y", "Accel Z"
    );
    println!("     (deg/s)                 |      (g)");
    println!("{}", "-".repeat(64));

    let gyro_lsb = config.gyro_range.lsb_per_dps();
    let accel_lsb = config.accel_range.lsb_per_g();

    loop {
        let raw = imu.read_axes()?;
        println!(
            "{:10.2} {:10.2} {:10.2} | {:8.3} {:8.3} {:8.3}",
            raw.gyro[0] as f64 / gyro_lsb,
            raw.gyro[1] as f64 / gyro_lsb,
            raw.gyro[2] as f64 / gyro_lsb,
            raw.accel[0] as f64 / accel_lsb,
            raw.accel[1] as f64 / accel_lsb,
            raw.accel[2] as f64 / accel_lsb,
        );
        thread::sleep(Duration::from_millis(50)); // 20 Hz
    }
}
