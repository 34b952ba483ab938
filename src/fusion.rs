use anyhow::{ensure, Result};

/// Fixed-weight complementary filter.
///
/// Blends a gyro-integrated angle (drifts slowly, low noise) with an
/// accelerometer-derived angle (noisy, no drift) into one estimate:
/// `angle = alpha * (angle + gyro_rate * dt) + (1 - alpha) * accel_angle`.
/// Higher alpha trusts the gyro more. Callers guarantee `dt >= 0`.
#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    alpha: f64,
    angle: f64,
}

impl ComplementaryFilter {
    pub const DEFAULT_ALPHA: f64 = 0.96;

    pub fn new(alpha: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&alpha),
            "fusion coefficient must lie in [0, 1], got {alpha}"
        );
        Ok(Self { alpha, angle: 0.0 })
    }

    /// Start from a known angle instead of zero.
    pub fn with_initial_angle(alpha: f64, angle: f64) -> Result<Self> {
        let mut filter = Self::new(alpha)?;
        filter.angle = angle;
        Ok(filter)
    }

    /// Current fused estimate.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Advance the estimate by one cycle; `gyro_rate` and `accel_angle`
    /// must share units (the rate per second, the angle absolute).
    pub fn update(&mut self, gyro_rate: f64, accel_angle: f64, dt: f64) -> f64 {
        self.angle = self.alpha * (self.angle + gyro_rate * dt) + (1.0 - self.alpha) * accel_angle;
        self.angle
    }
}
