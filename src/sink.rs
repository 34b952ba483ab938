use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::sampler::SampleRecord;

/// Per-cycle consumer of emitted records.
///
/// `emit` is called exactly once per sampling cycle and must return promptly;
/// the loop treats a failure as non-fatal and keeps acquiring. Implementations
/// that buffer should flush in `flush`, which runs once at clean shutdown.
pub trait Sink {
    fn emit(&mut self, record: &SampleRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes accelerometer and gyroscope streams to two delimited files.
pub struct CsvSink {
    accel: BufWriter<File>,
    gyro: BufWriter<File>,
}

impl CsvSink {
    /// Create (truncating) both output files and write their headers.
    pub fn create<P: AsRef<Path>>(accel_path: P, gyro_path: P) -> Result<Self> {
        let accel_path = accel_path.as_ref();
        let gyro_path = gyro_path.as_ref();
        let accel = File::create(accel_path)
            .with_context(|| format!("Failed to create {}", accel_path.display()))?;
        let gyro = File::create(gyro_path)
            .with_context(|| format!("Failed to create {}", gyro_path.display()))?;

        let mut sink = Self {
            accel: BufWriter::new(accel),
            gyro: BufWriter::new(gyro),
        };
        writeln!(sink.accel, "Time (s),Accel X,Accel Y,Accel Z")?;
        writeln!(sink.gyro, "Time (s),Gyro X,Gyro Y,Gyro Z")?;
        Ok(sink)
    }
}

impl Sink for CsvSink {
    fn emit(&mut self, record: &SampleRecord) -> Result<()> {
        writeln!(
            self.accel,
            "{:.4},{:.6},{:.6},{:.6}",
            record.elapsed_s, record.accel[0], record.accel[1], record.accel[2]
        )?;
        writeln!(
            self.gyro,
            "{:.4},{:.6},{:.6},{:.6}",
            record.elapsed_s, record.gyro[0], record.gyro[1], record.gyro[2]
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.accel.flush().context("Failed to flush accelerometer file")?;
        self.gyro.flush().context("Failed to flush gyroscope file")?;
        Ok(())
    }
}

/// Single-slot, overwrite-on-write cell holding the most recent record.
///
/// Clone handles share the slot, so a serving layer can poll `snapshot`
/// while the sampling loop publishes, without touching loop-internal state.
#[derive(Clone, Default)]
pub struct LatestSample {
    slot: Arc<Mutex<Option<SampleRecord>>>,
}

impl LatestSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, record: SampleRecord) {
        *self.slot.lock().unwrap() = Some(record);
    }

    /// Most recently published record, if any cycle has completed yet.
    pub fn snapshot(&self) -> Option<SampleRecord> {
        *self.slot.lock().unwrap()
    }
}

impl Sink for LatestSample {
    fn emit(&mut self, record: &SampleRecord) -> Result<()> {
        self.publish(*record);
        Ok(())
    }
}
