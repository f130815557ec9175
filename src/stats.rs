//! Latency statistics over accumulated launch samples.
//!
//! Launch-time keys in a [`MetricsBag`](crate::MetricsBag) accumulate one
//! millisecond value per launch. This module turns those buffers into
//! distribution statistics, so a test can assert a latency budget over a
//! batch of launches instead of a single sample.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use appstart_testlib::stats::LatencyStats;
//!
//! let samples = vec![
//!     Duration::from_millis(480),
//!     Duration::from_millis(512),
//!     Duration::from_millis(505),
//! ];
//! let stats = LatencyStats::from_samples(samples);
//! assert!(stats.p95 < Duration::from_millis(600));
//! ```

use std::time::Duration;

use crate::startup::MetricsBag;

/// Statistical analysis of launch-latency samples.
///
/// Provides min, max, mean, and percentile statistics for a collection of
/// latency samples.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "json-report", derive(serde::Serialize, serde::Deserialize))]
pub struct LatencyStats {
    /// Number of samples
    pub count: usize,
    /// Minimum latency
    pub min: Duration,
    /// Maximum latency
    pub max: Duration,
    /// Mean (average) latency
    pub mean: Duration,
    /// Median (50th percentile) latency
    pub median: Duration,
    /// 95th percentile latency
    pub p95: Duration,
    /// 99th percentile latency
    pub p99: Duration,
}

impl LatencyStats {
    /// Creates latency statistics from a collection of samples.
    ///
    /// # Panics
    ///
    /// Panics if `samples` is empty.
    pub fn from_samples(mut samples: Vec<Duration>) -> Self {
        assert!(!samples.is_empty(), "Cannot compute stats from empty samples");

        samples.sort();
        let count = samples.len();

        let min = samples[0];
        let max = samples[count - 1];

        let total: Duration = samples.iter().sum();
        let mean = total / count as u32;

        let median = percentile(&samples, 50.0);
        let p95 = percentile(&samples, 95.0);
        let p99 = percentile(&samples, 99.0);

        Self { count, min, max, mean, median, p95, p99 }
    }

    /// Returns a formatted summary string.
    ///
    /// # Example Output
    ///
    /// ```text
    /// Launch latency (12 samples):
    ///   Min: 480.00ms
    ///   Max: 1043.00ms
    ///   Mean: 612.42ms
    ///   Median: 548.00ms
    ///   p95: 1001.55ms
    ///   p99: 1034.71ms
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "Launch latency ({} samples):\n\
             Min: {:.2}ms\n\
             Max: {:.2}ms\n\
             Mean: {:.2}ms\n\
             Median: {:.2}ms\n\
             p95: {:.2}ms\n\
             p99: {:.2}ms",
            self.count,
            self.min.as_secs_f64() * 1000.0,
            self.max.as_secs_f64() * 1000.0,
            self.mean.as_secs_f64() * 1000.0,
            self.median.as_secs_f64() * 1000.0,
            self.p95.as_secs_f64() * 1000.0,
            self.p99.as_secs_f64() * 1000.0
        )
    }
}

/// Builds [`LatencyStats`] from the comma-joined millis buffer under `key`.
///
/// Returns `None` if the key is absent or holds no parseable values.
///
/// # Example
///
/// ```rust
/// use appstart_testlib::{cold_startup_key, stats::stats_for, MetricsBag};
///
/// let mut bag = MetricsBag::new();
/// let key = cold_startup_key("com.example.app");
/// bag.append(&key, 512);
/// bag.append(&key, 498);
///
/// let stats = stats_for(&bag, &key).unwrap();
/// assert_eq!(stats.count, 2);
/// ```
pub fn stats_for(bag: &MetricsBag, key: &str) -> Option<LatencyStats> {
    let samples: Vec<Duration> = bag
        .values(key)
        .iter()
        .filter_map(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .collect();

    if samples.is_empty() {
        return None;
    }

    Some(LatencyStats::from_samples(samples))
}

/// Calculates a percentile from sorted duration data.
///
/// Uses linear interpolation for percentiles that fall between samples.
///
/// # Panics
///
/// Panics if `sorted_data` is empty.
fn percentile(sorted_data: &[Duration], percentile: f64) -> Duration {
    assert!(!sorted_data.is_empty(), "Cannot compute percentile from empty data");

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        // Linear interpolation
        let weight = index - lower as f64;
        let lower_dur = sorted_data[lower].as_secs_f64();
        let upper_dur = sorted_data[upper].as_secs_f64();
        let interpolated = lower_dur * (1.0 - weight) + upper_dur * weight;
        Duration::from_secs_f64(interpolated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stats() {
        let samples = vec![
            Duration::from_millis(10),
            Duration::from_millis(15),
            Duration::from_millis(12),
            Duration::from_millis(20),
            Duration::from_millis(11),
        ];

        let stats = LatencyStats::from_samples(samples);

        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(20));
        assert!(stats.mean >= Duration::from_millis(13));
        assert!(stats.mean <= Duration::from_millis(14));
    }

    #[test]
    fn test_latency_stats_summary() {
        let samples = vec![Duration::from_millis(10), Duration::from_millis(20)];
        let stats = LatencyStats::from_samples(samples);
        let summary = stats.summary();

        assert!(summary.contains("2 samples"));
        assert!(summary.contains("Min:"));
        assert!(summary.contains("Max:"));
    }

    #[test]
    fn test_percentile_calculation() {
        let data = vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
            Duration::from_millis(40),
            Duration::from_millis(50),
        ];

        let p50 = percentile(&data, 50.0);
        assert_eq!(p50, Duration::from_millis(30));

        let p0 = percentile(&data, 0.0);
        assert_eq!(p0, Duration::from_millis(10));

        let p100 = percentile(&data, 100.0);
        assert_eq!(p100, Duration::from_millis(50));
    }

    #[test]
    fn test_percentile_interpolation() {
        let data = vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
            Duration::from_millis(40),
        ];

        // p25 falls between 10 and 20 (approximately 17.5ms with linear interpolation)
        let p25 = percentile(&data, 25.0);
        assert!(p25 >= Duration::from_millis(15));
        assert!(p25 <= Duration::from_millis(18));
    }

    #[test]
    fn test_stats_for_metric_key() {
        let mut bag = MetricsBag::new();
        bag.append("cold_startup_com.example", 500);
        bag.append("cold_startup_com.example", 540);
        bag.append("cold_startup_com.example", 520);

        let stats = stats_for(&bag, "cold_startup_com.example").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, Duration::from_millis(500));
        assert_eq!(stats.max, Duration::from_millis(540));
    }

    #[test]
    fn test_stats_for_missing_key() {
        let bag = MetricsBag::new();
        assert!(stats_for(&bag, "cold_startup_com.example").is_none());
    }

    #[test]
    #[should_panic(expected = "Cannot compute stats from empty samples")]
    fn test_latency_stats_empty_panic() {
        let samples: Vec<Duration> = vec![];
        LatencyStats::from_samples(samples);
    }

    #[test]
    #[should_panic(expected = "Cannot compute percentile from empty data")]
    fn test_percentile_empty_panic() {
        let data: Vec<Duration> = vec![];
        percentile(&data, 50.0);
    }
}
