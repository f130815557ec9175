//! JSON export of metric snapshots (feature `json-report`).
//!
//! A [`MetricsReport`] pairs a metric snapshot with a collection timestamp
//! in a serialization-friendly shape, for shipping results off the test
//! machine to whatever consumes them.
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::{report::MetricsReport, MetricsBag};
//!
//! let mut bag = MetricsBag::new();
//! bag.append("cold_startup_com.example.app", 512);
//!
//! let report = MetricsReport::from_metrics("cold_launch_run", &bag);
//! let json = report.to_json().unwrap();
//! let restored = MetricsReport::from_json(&json).unwrap();
//! assert_eq!(restored.entries, report.entries);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceTestError, Result};
use crate::startup::MetricsBag;

/// A serializable snapshot of one collection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Name of the run that produced the snapshot.
    pub run_name: String,
    /// When the snapshot was taken (UTC, RFC 3339).
    pub collected_at: String,
    /// The metric entries, comma-joined buffers keyed by metric name.
    pub entries: BTreeMap<String, String>,
}

impl MetricsReport {
    /// Builds a report from a metric bag, stamped with the current time.
    pub fn from_metrics(run_name: impl Into<String>, metrics: &MetricsBag) -> Self {
        Self {
            run_name: run_name.into(),
            collected_at: chrono::Utc::now().to_rfc3339(),
            entries: metrics.snapshot(),
        }
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DeviceTestError::Parse(format!("Failed to serialize report: {}", e)))
    }

    /// Parses a report from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DeviceTestError::Parse(format!("Failed to parse report: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_roundtrip() {
        let mut bag = MetricsBag::new();
        bag.append("cold_startup_com.example.app", 512);
        bag.set("cold_startup_total_count", 1);

        let report = MetricsReport::from_metrics("run", &bag);
        let json = report.to_json().unwrap();
        let restored = MetricsReport::from_json(&json).unwrap();

        assert_eq!(restored.run_name, "run");
        assert_eq!(restored.entries, report.entries);
    }

    #[test]
    fn test_report_rejects_malformed_json() {
        assert!(MetricsReport::from_json("{not json").is_err());
    }
}
