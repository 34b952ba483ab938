use anyhow::{anyhow, Result};
use embedded_hal::i2c::I2c;

/// Default MPU-6050 I2C address (AD0 pin low).
pub const DEFAULT_ADDRESS: u8 = 0x68;

// MPU-6050 register map (the subset this driver touches)
pub const PWR_MGMT_1: u8 = 0x6B;
pub const SMPLRT_DIV: u8 = 0x19;
pub const CONFIG: u8 = 0x1A;
pub const GYRO_CONFIG: u8 = 0x1B;
pub const ACCEL_CONFIG: u8 = 0x1C;
pub const INT_ENABLE: u8 = 0x38;
pub const ACCEL_XOUT_H: u8 = 0x3B;
pub const ACCEL_YOUT_H: u8 = 0x3D;
pub const ACCEL_ZOUT_H: u8 = 0x3F;
pub const GYRO_XOUT_H: u8 = 0x43;
pub const GYRO_YOUT_H: u8 = 0x45;
pub const GYRO_ZOUT_H: u8 = 0x47;

/// Decode two adjacent 8-bit register reads into one signed 16-bit sample.
///
/// The sensor stores each axis big-endian across a high/low register pair;
/// the combined word is two's-complement.
pub fn decode_word(high: u8, low: u8) -> i16 {
    (((high as u16) << 8) | low as u16) as i16
}

/// Gyroscope full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GyroRange {
    Dps250,
    Dps500,
    Dps1000,
    Dps2000,
}

impl GyroRange {
    /// GYRO_CONFIG register value selecting this range.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Dps250 => 0x00,
            Self::Dps500 => 0x08,
            Self::Dps1000 => 0x10,
            Self::Dps2000 => 0x18,
        }
    }

    /// Sensitivity at this range, in LSB per degree/second.
    pub const fn lsb_per_dps(self) -> f64 {
        match self {
            Self::Dps250 => 131.0,
            Self::Dps500 => 65.5,
            Self::Dps1000 => 32.8,
            Self::Dps2000 => 16.4,
        }
    }

    /// Map a full-scale range in degrees/second to the matching setting.
    pub fn from_dps(dps: u16) -> Option<Self> {
        match dps {
            250 => Some(Self::Dps250),
            500 => Some(Self::Dps500),
            1000 => Some(Self::Dps1000),
            2000 => Some(Self::Dps2000),
            _ => None,
        }
    }
}

/// Accelerometer full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelRange {
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    /// ACCEL_CONFIG register value selecting this range.
    pub const fn bits(self) -> u8 {
        match self {
            Self::G2 => 0x00,
            Self::G4 => 0x08,
            Self::G8 => 0x10,
            Self::G16 => 0x18,
        }
    }

    /// Sensitivity at this range, in LSB per g.
    pub const fn lsb_per_g(self) -> f64 {
        match self {
            Self::G2 => 16384.0,
            Self::G4 => 8192.0,
            Self::G8 => 4096.0,
            Self::G16 => 2048.0,
        }
    }

    /// Map a full-scale range in g to the matching setting.
    pub fn from_g(g: u8) -> Option<Self> {
        match g {
            2 => Some(Self::G2),
            4 => Some(Self::G4),
            8 => Some(Self::G8),
            16 => Some(Self::G16),
            _ => None,
        }
    }
}

/// One-time device configuration written at construction.
///
/// Downstream scale factors depend on the selected ranges, so these are
/// plain fields rather than baked-in constants.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// I2C address of the sensor.
    pub address: u8,
    /// Sample-rate divider: gyro output rate = 1 kHz / (1 + divider).
    pub sample_rate_div: u8,
    /// Digital low-pass filter bandwidth setting (CONFIG register).
    pub dlpf: u8,
    pub gyro_range: GyroRange,
    pub accel_range: AccelRange,
    /// Assert the data-ready interrupt line.
    pub int_enable: bool,
}

impl Default for DriverConfig {
    /// 125 Hz output rate, 5 Hz DLPF bandwidth, ±1000 °/s, ±8 g.
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            sample_rate_div: 0x07,
            dlpf: 0x06,
            gyro_range: GyroRange::Dps1000,
            accel_range: AccelRange::G8,
            int_enable: false,
        }
    }
}

/// Raw signed readings for all six axes from one acquisition, in device LSBs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

/// Register-level MPU-6050 driver over any embedded-hal I2C bus.
pub struct Mpu6050<I2C> {
    i2c: I2C,
    config: DriverConfig,
}

impl<I2C: I2c> Mpu6050<I2C> {
    /// Take ownership of the bus and perform the one-time configuration:
    /// wake the device from sleep, then program the sample-rate divider,
    /// low-pass bandwidth, full-scale ranges, and optionally the interrupt.
    pub fn new(i2c: I2C, config: DriverConfig) -> Result<Self> {
        let mut driver = Self { i2c, config };
        driver.write_register(PWR_MGMT_1, 0x00)?;
        driver.write_register(SMPLRT_DIV, config.sample_rate_div)?;
        driver.write_register(CONFIG, config.dlpf)?;
        driver.write_register(GYRO_CONFIG, config.gyro_range.bits())?;
        driver.write_register(ACCEL_CONFIG, config.accel_range.bits())?;
        if config.int_enable {
            driver.write_register(INT_ENABLE, 0x01)?;
        }
        Ok(driver)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Give the bus handle back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.config.address, &[reg, value])
            .map_err(|e| anyhow!("Failed to write register 0x{:02X}: {:?}", reg, e))
    }

    fn read_word(&mut self, reg: u8) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.config.address, &[reg], &mut buf)
            .map_err(|e| anyhow!("Failed to read register pair at 0x{:02X}: {:?}", reg, e))?;
        Ok(decode_word(buf[0], buf[1]))
    }

    /// Read all six axes in one call so inter-axis skew is bounded by the
    /// bus transaction time. A bus error aborts the whole read; no partial
    /// or stale data is ever returned.
    pub fn read_axes(&mut self) -> Result<RawSample> {
        Ok(RawSample {
            accel: [
                self.read_word(ACCEL_XOUT_H)?,
                self.read_word(ACCEL_YOUT_H)?,
                self.read_word(ACCEL_ZOUT_H)?,
            ],
            gyro: [
                self.read_word(GYRO_XOUT_H)?,
                self.read_word(GYRO_YOUT_H)?,
                self.read_word(GYRO_ZOUT_H)?,
            ],
        })
    }
}
