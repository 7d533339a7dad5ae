//! Summary statistics over histogram samples

use serde::{Deserialize, Serialize};

/// Count, extremes and mean of a sample set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Samples counted, after dropping non-finite ones
    pub count: usize,
}

impl SampleStats {
    /// Summarise `samples` in one pass. NaN and infinite samples are ignored.
    ///
    /// ```
    /// use stackops_common::stats::SampleStats;
    ///
    /// let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    /// let stats = SampleStats::from_samples(&samples);
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.avg, 3.0);
    /// assert_eq!(stats.count, 5);
    /// ```
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut running = RunningStats::default();
        for &x in samples {
            running.record(x);
        }
        running.summary()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Constant-size accumulator behind a histogram that is fed forever
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl RunningStats {
    /// Fold one sample in. NaN and infinite samples are ignored.
    pub fn record(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        self.sum += x;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn summary(&self) -> SampleStats {
        if self.count == 0 {
            return SampleStats::default();
        }
        SampleStats {
            min: self.min,
            max: self.max,
            avg: self.sum / self.count as f64,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_samples() {
        let stats = SampleStats::from_samples(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats, SampleStats::default());
    }

    #[test]
    fn test_filters_non_finite() {
        let stats = SampleStats::from_samples(&[f64::NAN, 2.0, f64::INFINITY, 4.0]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.avg, 3.0);
    }

    #[test]
    fn test_single_sample() {
        let stats = SampleStats::from_samples(&[7.5]);
        assert_eq!(stats.min, 7.5);
        assert_eq!(stats.max, 7.5);
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_running_matches_batch() {
        let samples = [3.0, f64::NAN, 1.0, 8.0, 4.0];
        let mut running = RunningStats::default();
        assert_eq!(running.summary(), SampleStats::default());
        for x in samples {
            running.record(x);
        }
        assert_eq!(running.count(), 4);
        assert_eq!(running.summary(), SampleStats::from_samples(&samples));
        assert_eq!(running.summary().avg, 4.0);
    }
}
