use std::collections::VecDeque;

use anyhow::{ensure, Result};

/// Cascaded threshold + moving-average filter for one axis.
///
/// The threshold stage rejects single-sample spikes by substituting the last
/// emitted average; the moving-average stage smooths what remains over a
/// fixed-capacity window. The window never exceeds its configured capacity,
/// and the emitted value is always the mean of the current window contents.
#[derive(Debug, Clone)]
pub struct AxisFilter {
    window: VecDeque<f64>,
    capacity: usize,
    threshold: f64,
    last_average: Option<f64>,
}

impl AxisFilter {
    /// Invalid parameters are rejected here, before any sample flows.
    pub fn new(capacity: usize, threshold: f64) -> Result<Self> {
        ensure!(capacity > 0, "filter window capacity must be at least 1");
        ensure!(
            threshold >= 0.0,
            "filter threshold must be non-negative, got {threshold}"
        );
        Ok(Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            threshold,
            last_average: None,
        })
    }

    /// Last emitted average, if at least one sample has been seen.
    pub fn last_average(&self) -> Option<f64> {
        self.last_average
    }

    /// Feed one corrected value; returns the new filtered output.
    ///
    /// On the first call there is no prior average, so the threshold stage
    /// is skipped and the value passes straight into the window.
    pub fn update(&mut self, value: f64) -> f64 {
        let value = match self.last_average {
            Some(last) if (value - last).abs() > self.threshold => last,
            _ => value,
        };

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);

        let average = self.window.iter().sum::<f64>() / self.window.len() as f64;
        self.last_average = Some(average);
        average
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(AxisFilter::new(0, 10.0).is_err());
        assert!(AxisFilter::new(5, -1.0).is_err());
        assert!(AxisFilter::new(1, 0.0).is_ok());
    }

    #[test]
    fn test_first_call_passes_unmodified() {
        let mut filter = AxisFilter::new(5, 0.1).unwrap();
        // Far beyond any threshold, but there is no prior average yet.
        assert_eq!(filter.update(1e6), 1e6);
        assert_eq!(filter.last_average(), Some(1e6));
    }

    #[test]
    fn test_spike_replaced_by_last_average() {
        let mut filter = AxisFilter::new(5, 50.0).unwrap();
        assert_eq!(filter.update(10.0), 10.0);
        // |1000 - 10| > 50, so the window receives 10 again, not 1000.
        assert_eq!(filter.update(1000.0), 10.0);
        assert_eq!(filter.last_average(), Some(10.0));
    }

    #[test]
    fn test_genuine_motion_within_threshold_tracks() {
        let mut filter = AxisFilter::new(2, 50.0).unwrap();
        filter.update(10.0);
        // |40 - 10| <= 50: accepted, mean of [10, 40].
        assert_eq!(filter.update(40.0), 25.0);
    }

    #[test]
    fn test_average_over_full_window() {
        let mut filter = AxisFilter::new(4, 1e9).unwrap();
        let values = [1.0, 2.0, 3.0, 6.0];
        let mut out = 0.0;
        for v in values {
            out = filter.update(v);
        }
        assert_eq!(out, 3.0);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut filter = AxisFilter::new(3, 1e9).unwrap();
        for v in [1.0, 2.0, 3.0] {
            filter.update(v);
        }
        // Window becomes [2, 3, 7].
        assert_eq!(filter.update(7.0), 4.0);
        assert_eq!(filter.update(7.0), (3.0 + 7.0 + 7.0) / 3.0);
    }

    #[test]
    fn test_constant_input_is_fixed_point() {
        let mut filter = AxisFilter::new(5, 1000.0).unwrap();
        for _ in 0..20 {
            assert_eq!(filter.update(42.5), 42.5);
        }
    }
}
