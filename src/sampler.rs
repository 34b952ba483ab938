use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use embedded_hal::i2c::I2c;
use serde::Serialize;

use crate::calibration::CalibrationSet;
use crate::driver::Mpu6050;
use crate::filter::AxisFilter;
use crate::fusion::ComplementaryFilter;
use crate::sink::Sink;

/// One emitted unit: elapsed time since run start plus six filtered values.
///
/// Consumers are free to serialize this however they wish.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    /// Seconds since acquisition start; strictly increasing across a run.
    pub elapsed_s: f64,
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

/// Axis-filter parameters for one sensor triple.
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    pub window: usize,
    pub threshold: f64,
}

/// Sampling-run configuration.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Total run duration.
    pub duration: Duration,
    /// Target inter-sample delay.
    pub period: Duration,
    pub accel_filter: FilterParams,
    pub gyro_filter: FilterParams,
    /// Complementary-filter coefficient; `None` leaves fusion disengaged.
    pub fusion_alpha: Option<f64>,
}

impl Default for SamplerConfig {
    /// 30 s at 100 Hz; looser accel filtering than gyro, fusion off.
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            period: Duration::from_millis(10),
            accel_filter: FilterParams {
                window: 10,
                threshold: 100.0,
            },
            gyro_filter: FilterParams {
                window: 15,
                threshold: 50.0,
            },
            fusion_alpha: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
    Stopped,
}

fn filter_bank(params: FilterParams) -> Result<[AxisFilter; 3]> {
    Ok([
        AxisFilter::new(params.window, params.threshold)?,
        AxisFilter::new(params.window, params.threshold)?,
        AxisFilter::new(params.window, params.threshold)?,
    ])
}

/// Drives the fixed-cadence acquire-calibrate-filter-emit cycle.
///
/// Owns the driver, the six per-axis filters, and the optional fusion filter
/// for the run's lifetime; nothing else holds references to them, so the
/// loop is strictly sequential and lock-free.
pub struct Sampler<I2C> {
    driver: Mpu6050<I2C>,
    calibration: CalibrationSet,
    accel_filters: [AxisFilter; 3],
    gyro_filters: [AxisFilter; 3],
    fusion: Option<ComplementaryFilter>,
    config: SamplerConfig,
    state: SamplerState,
}

impl<I2C: I2c> Sampler<I2C> {
    /// Validates all configuration before any cycle runs.
    pub fn new(
        driver: Mpu6050<I2C>,
        calibration: CalibrationSet,
        config: SamplerConfig,
    ) -> Result<Self> {
        ensure!(config.period > Duration::ZERO, "inter-sample period must be positive");
        ensure!(config.duration > Duration::ZERO, "run duration must be positive");
        let accel_filters = filter_bank(config.accel_filter)?;
        let gyro_filters = filter_bank(config.gyro_filter)?;
        let fusion = config
            .fusion_alpha
            .map(ComplementaryFilter::new)
            .transpose()?;
        Ok(Self {
            driver,
            calibration,
            accel_filters,
            gyro_filters,
            fusion,
            config,
            state: SamplerState::Idle,
        })
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Last fused angle in degrees, if fusion is engaged.
    pub fn fused_angle(&self) -> Option<f64> {
        self.fusion.as_ref().map(|f| f.angle())
    }

    /// One acquisition cycle: read all six axes, calibrate, filter, and
    /// (if engaged) advance the fusion estimate. A bus failure aborts the
    /// cycle with no partial output.
    fn cycle(&mut self, dt: f64, elapsed_s: f64) -> Result<SampleRecord> {
        let raw = self
            .driver
            .read_axes()
            .context("Failed to read sensor axes")?;

        let mut accel = [0.0; 3];
        let mut gyro = [0.0; 3];
        for i in 0..3 {
            accel[i] = self.accel_filters[i].update(self.calibration.accel[i].correct(raw.accel[i]));
            gyro[i] = self.gyro_filters[i].update(self.calibration.gyro[i].correct(raw.gyro[i]));
        }

        if let Some(fusion) = self.fusion.as_mut() {
            // Roll from the filtered values: X rotation rate in deg/s
            // against the accelerometer angle in the Y/Z plane. The atan2
            // ratio cancels any uniform accelerometer scale.
            let rate_dps = gyro[0] / self.driver.config().gyro_range.lsb_per_dps();
            let accel_angle = accel[1].atan2(accel[2]).to_degrees();
            fusion.update(rate_dps, accel_angle, dt);
        }

        Ok(SampleRecord {
            elapsed_s,
            accel,
            gyro,
        })
    }

    /// Run until the configured duration elapses or `stop` is raised.
    ///
    /// Cancellation is honored at the next cycle boundary; in-flight cycle
    /// work finishes first, so no partial record is ever emitted. A driver
    /// failure ends the run immediately with the error; a sink failure is
    /// logged and the next cycle proceeds. Returns the number of emitted
    /// records.
    pub async fn run(&mut self, sink: &mut dyn Sink, stop: Arc<AtomicBool>) -> Result<u64> {
        ensure!(
            self.state == SamplerState::Idle,
            "sampling run already consumed"
        );
        self.state = SamplerState::Running;
        let result = self.run_inner(sink, &stop).await;
        self.state = SamplerState::Stopped;
        result
    }

    async fn run_inner(&mut self, sink: &mut dyn Sink, stop: &AtomicBool) -> Result<u64> {
        log::info!(
            "sampling for {:.1}s at {:.0}ms cadence",
            self.config.duration.as_secs_f64(),
            self.config.period.as_secs_f64() * 1000.0
        );

        let start = Instant::now();
        let mut last = start;
        let mut emitted: u64 = 0;
        let report_every = (1.0 / self.config.period.as_secs_f64()).round().max(1.0) as u64;

        let mut interval = tokio::time::interval(self.config.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while start.elapsed() < self.config.duration && !stop.load(Ordering::SeqCst) {
            interval.tick().await;

            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;
            let elapsed_s = now.duration_since(start).as_secs_f64();

            let record = self.cycle(dt, elapsed_s)?;

            if let Err(e) = sink.emit(&record) {
                log::warn!("sink emit failed: {e:#}");
            }
            emitted += 1;

            if emitted % report_every == 0 {
                match self.fused_angle() {
                    Some(angle) => log::info!(
                        "t={:.2}s gyro=[{:.2} {:.2} {:.2}] fused={:.2}°",
                        elapsed_s,
                        record.gyro[0],
                        record.gyro[1],
                        record.gyro[2],
                        angle
                    ),
                    None => log::info!(
                        "t={:.2}s gyro=[{:.2} {:.2} {:.2}]",
                        elapsed_s,
                        record.gyro[0],
                        record.gyro[1],
                        record.gyro[2]
                    ),
                }
            }
        }

        if let Err(e) = sink.flush() {
            log::warn!("sink flush failed: {e:#}");
        }
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{
        DriverConfig, ACCEL_XOUT_H, ACCEL_YOUT_H, ACCEL_ZOUT_H, GYRO_XOUT_H, GYRO_YOUT_H,
        GYRO_ZOUT_H,
    };
    use crate::mockbus::MockBus;

    #[derive(Default)]
    struct VecSink {
        records: Vec<SampleRecord>,
    }

    impl Sink for VecSink {
        fn emit(&mut self, record: &SampleRecord) -> Result<()> {
            self.records.push(*record);
            Ok(())
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn emit(&mut self, _record: &SampleRecord) -> Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    fn constant_bus() -> MockBus {
        let mut bus = MockBus::new();
        bus.set_word(ACCEL_XOUT_H, 1000);
        bus.set_word(ACCEL_YOUT_H, 2000);
        bus.set_word(ACCEL_ZOUT_H, 4096);
        bus.set_word(GYRO_XOUT_H, 100);
        bus.set_word(GYRO_YOUT_H, -200);
        bus.set_word(GYRO_ZOUT_H, 300);
        bus
    }

    fn sampler_with(config: SamplerConfig) -> Sampler<MockBus> {
        let driver = Mpu6050::new(constant_bus(), DriverConfig::default()).unwrap();
        Sampler::new(driver, CalibrationSet::default(), config).unwrap()
    }

    #[test]
    fn test_invalid_configuration_rejected_at_construction() {
        let driver = Mpu6050::new(constant_bus(), DriverConfig::default()).unwrap();
        let config = SamplerConfig {
            period: Duration::ZERO,
            ..SamplerConfig::default()
        };
        assert!(Sampler::new(driver, CalibrationSet::default(), config).is_err());

        let driver = Mpu6050::new(constant_bus(), DriverConfig::default()).unwrap();
        let config = SamplerConfig {
            gyro_filter: FilterParams {
                window: 0,
                threshold: 50.0,
            },
            ..SamplerConfig::default()
        };
        assert!(Sampler::new(driver, CalibrationSet::default(), config).is_err());

        let driver = Mpu6050::new(constant_bus(), DriverConfig::default()).unwrap();
        let config = SamplerConfig {
            fusion_alpha: Some(1.5),
            ..SamplerConfig::default()
        };
        assert!(Sampler::new(driver, CalibrationSet::default(), config).is_err());
    }

    #[tokio::test]
    async fn test_constant_input_end_to_end() {
        let config = SamplerConfig {
            duration: Duration::from_secs(1),
            period: Duration::from_millis(100),
            accel_filter: FilterParams {
                window: 5,
                threshold: 1000.0,
            },
            gyro_filter: FilterParams {
                window: 5,
                threshold: 1000.0,
            },
            fusion_alpha: None,
        };
        let mut sampler = sampler_with(config);
        let mut sink = VecSink::default();
        let stop = Arc::new(AtomicBool::new(false));

        let emitted = sampler.run(&mut sink, stop).await.unwrap();
        assert_eq!(emitted as usize, sink.records.len());
        assert!((9..=11).contains(&sink.records.len()));

        // Identity calibration and a constant input: every record holds the
        // calibrated constant exactly.
        for record in &sink.records {
            assert_eq!(record.accel, [1000.0, 2000.0, 4096.0]);
            assert_eq!(record.gyro, [100.0, -200.0, 300.0]);
        }

        let mut previous = -1.0;
        for record in &sink.records {
            assert!(record.elapsed_s > previous);
            previous = record.elapsed_s;
        }
        assert!(previous < 1.0 + 2.0 * 0.1);
        assert_eq!(sampler.state(), SamplerState::Stopped);
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_cycle_boundary() {
        let config = SamplerConfig {
            duration: Duration::from_secs(30),
            period: Duration::from_millis(10),
            ..SamplerConfig::default()
        };
        let mut sampler = sampler_with(config);
        let mut sink = VecSink::default();
        let stop = Arc::new(AtomicBool::new(false));

        let flag = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let emitted = sampler.run(&mut sink, stop).await.unwrap();
        assert!(emitted > 0);
        assert!(emitted < 100, "run should end well before the 30s duration");
        assert_eq!(sampler.state(), SamplerState::Stopped);
    }

    #[tokio::test]
    async fn test_driver_failure_is_fatal() {
        let mut bus = constant_bus();
        // Configuration writes succeed; the first axis read fails.
        bus.fail_after = Some(5);
        let driver = Mpu6050::new(bus, DriverConfig::default()).unwrap();
        let mut sampler =
            Sampler::new(driver, CalibrationSet::default(), SamplerConfig::default()).unwrap();
        let mut sink = VecSink::default();
        let stop = Arc::new(AtomicBool::new(false));

        assert!(sampler.run(&mut sink, stop).await.is_err());
        assert_eq!(sampler.state(), SamplerState::Stopped);
        assert!(sink.records.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_acquisition() {
        let config = SamplerConfig {
            duration: Duration::from_millis(100),
            period: Duration::from_millis(20),
            ..SamplerConfig::default()
        };
        let mut sampler = sampler_with(config);
        let stop = Arc::new(AtomicBool::new(false));

        let emitted = sampler.run(&mut FailingSink, stop).await.unwrap();
        assert!(emitted >= 4);
    }

    #[tokio::test]
    async fn test_run_is_single_use() {
        let config = SamplerConfig {
            duration: Duration::from_millis(40),
            period: Duration::from_millis(10),
            ..SamplerConfig::default()
        };
        let mut sampler = sampler_with(config);
        assert_eq!(sampler.state(), SamplerState::Idle);

        let stop = Arc::new(AtomicBool::new(false));
        sampler.run(&mut VecSink::default(), stop.clone()).await.unwrap();
        assert_eq!(sampler.state(), SamplerState::Stopped);
        assert!(sampler.run(&mut VecSink::default(), stop).await.is_err());
    }

    #[tokio::test]
    async fn test_fusion_engaged_integrates_rate() {
        let config = SamplerConfig {
            duration: Duration::from_millis(200),
            period: Duration::from_millis(20),
            // Pure gyro integration: constant 328 LSB = 10 °/s at ±1000 °/s.
            fusion_alpha: Some(1.0),
            ..SamplerConfig::default()
        };
        let driver = {
            let mut bus = MockBus::new();
            bus.set_word(GYRO_XOUT_H, 328);
            bus.set_word(ACCEL_ZOUT_H, 4096);
            Mpu6050::new(bus, DriverConfig::default()).unwrap()
        };
        let mut sampler = Sampler::new(driver, CalibrationSet::default(), config).unwrap();
        let stop = Arc::new(AtomicBool::new(false));

        sampler.run(&mut VecSink::default(), stop).await.unwrap();
        let angle = sampler.fused_angle().expect("fusion engaged");
        // 10 °/s for ~0.2 s of integrated dt.
        assert!(angle > 0.5 && angle < 4.0, "angle = {angle}");
    }

    #[tokio::test]
    async fn test_fusion_disengaged_by_default() {
        let mut sampler = sampler_with(SamplerConfig {
            duration: Duration::from_millis(40),
            period: Duration::from_millis(10),
            ..SamplerConfig::default()
        });
        let stop = Arc::new(AtomicBool::new(false));
        sampler.run(&mut VecSink::default(), stop).await.unwrap();
        assert!(sampler.fused_angle().is_none());
    }
}
