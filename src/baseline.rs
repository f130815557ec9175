//! Baseline files for startup-metric regression detection.
//!
//! A baseline captures the shape of a collection session (which metric
//! keys a scenario produces, and how many values each accumulated) so later
//! runs can detect regressions such as a launch silently classifying as the
//! wrong transition or a fully-drawn report going missing.
//!
//! Launch times themselves vary run to run, so comparison checks key sets
//! and per-key value counts; only the counter keys are compared exactly.
//!
//! Set `UPDATE_BASELINES=1` to rewrite baselines instead of comparing, and
//! `BASELINE_DIR` to relocate them (default `tests/baselines`).

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use similar::{ChangeTag, TextDiff};

use crate::{
    error::{DeviceTestError, Result},
    startup::{MetricsBag, COLD_STARTUP_TOTAL_COUNT_KEY},
};

/// Default directory for baseline files.
const DEFAULT_BASELINE_DIR: &str = "tests/baselines";

/// Header marker for the baseline file format.
const BASELINE_HEADER_START: &str = "--- METRIC BASELINE ---";

/// Marker preceding the metric entries.
const BASELINE_METRICS_START: &str = "--- METRICS ---";

/// Get the baseline directory from the environment or use the default.
pub fn baseline_dir() -> PathBuf {
    std::env::var("BASELINE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_BASELINE_DIR))
}

/// Check if baselines should be rewritten instead of compared.
pub fn should_update_baselines() -> bool {
    std::env::var("UPDATE_BASELINES").map(|v| v == "1").unwrap_or(false)
}

/// Metadata for a baseline file.
#[derive(Debug, Clone)]
pub struct BaselineMetadata {
    /// Name of the test that created this baseline.
    pub test_name: String,
    /// Timestamp when the baseline was created.
    pub timestamp: String,
}

impl BaselineMetadata {
    /// Create new metadata for a baseline.
    pub fn new(test_name: impl Into<String>) -> Self {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        Self { test_name: test_name.into(), timestamp }
    }

    /// Serialize metadata to the baseline file header.
    pub fn to_header(&self) -> String {
        format!(
            "{}\ntest: {}\ntimestamp: {}\n",
            BASELINE_HEADER_START, self.test_name, self.timestamp
        )
    }

    /// Parse metadata from a baseline file header.
    pub fn from_header(header: &str) -> Option<Self> {
        let mut lines = header.lines();
        if !lines.next()?.contains(BASELINE_HEADER_START) {
            return None;
        }

        let mut test_name = String::new();
        let mut timestamp = String::new();
        for line in lines {
            if let Some(value) = line.strip_prefix("test: ") {
                test_name = value.to_string();
            } else if let Some(value) = line.strip_prefix("timestamp: ") {
                timestamp = value.to_string();
            }
        }

        Some(Self { test_name, timestamp })
    }
}

/// A saved metric baseline.
#[derive(Debug, Clone)]
pub struct BaselineFile {
    /// Metadata about the baseline.
    pub metadata: BaselineMetadata,
    /// The saved metric entries.
    pub entries: BTreeMap<String, String>,
}

impl BaselineFile {
    /// Create a baseline from a metric bag.
    pub fn from_metrics(test_name: impl Into<String>, metrics: &MetricsBag) -> Self {
        Self { metadata: BaselineMetadata::new(test_name), entries: metrics.snapshot() }
    }

    /// Serialize the baseline to its file format.
    pub fn render(&self) -> String {
        let mut out = self.metadata.to_header();
        out.push_str(BASELINE_METRICS_START);
        out.push('\n');
        for (key, value) in &self.entries {
            out.push_str(&format!("{}={}\n", key, value));
        }
        out
    }

    /// Parse a baseline from its file format.
    pub fn parse(content: &str) -> Result<Self> {
        let metrics_start = content.find(BASELINE_METRICS_START).ok_or_else(|| {
            DeviceTestError::Parse("Baseline file missing metrics marker".to_string())
        })?;

        let header = &content[..metrics_start];
        let body = &content[metrics_start + BASELINE_METRICS_START.len()..];

        let metadata = BaselineMetadata::from_header(header).ok_or_else(|| {
            DeviceTestError::Parse("Failed to parse baseline file header".to_string())
        })?;

        let mut entries = BTreeMap::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let (key, value) = line.split_once('=').ok_or_else(|| {
                DeviceTestError::Parse(format!("Malformed baseline entry: {:?}", line))
            })?;
            entries.insert(key.to_string(), value.to_string());
        }

        Ok(Self { metadata, entries })
    }

    /// Save the baseline under `dir`.
    pub fn save_in(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.baseline.txt", name));
        fs::write(&path, self.render())?;
        Ok(path)
    }

    /// Save the baseline in the default directory.
    pub fn save(&self, name: &str) -> Result<PathBuf> {
        self.save_in(&baseline_dir(), name)
    }

    /// Load a baseline from `dir`.
    pub fn load_from(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(format!("{}.baseline.txt", name));
        let content = fs::read_to_string(&path).map_err(|e| {
            DeviceTestError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read baseline '{}': {}", path.display(), e),
            ))
        })?;
        Self::parse(&content)
    }

    /// Load a baseline from the default directory.
    pub fn load(name: &str) -> Result<Self> {
        Self::load_from(&baseline_dir(), name)
    }

    /// Compare this baseline against a metric bag.
    ///
    /// Key sets must match, every key must hold the same number of values,
    /// and counter keys must match exactly. Launch-time values are allowed
    /// to differ.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error carrying a unified diff of the baseline
    /// shape against the current shape.
    pub fn compare(&self, metrics: &MetricsBag) -> Result<()> {
        let expected = shape_lines(&self.entries);
        let actual = shape_lines(&metrics.snapshot());

        if expected == actual {
            return Ok(());
        }

        Err(DeviceTestError::Parse(format!(
            "Baseline mismatch: {}\n{}",
            self.metadata.test_name,
            generate_diff(&expected, &actual)
        )))
    }
}

/// Renders the comparable shape of a metric map: `key value-count` lines,
/// with counter keys rendered verbatim.
fn shape_lines(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        if is_counter_key(key) {
            out.push_str(&format!("{} = {}\n", key, value));
        } else {
            out.push_str(&format!("{} [{} values]\n", key, value.split(',').count()));
        }
    }
    out
}

fn is_counter_key(key: &str) -> bool {
    key == COLD_STARTUP_TOTAL_COUNT_KEY || key.starts_with("cold_startup_count_")
}

/// Generate a unified diff between expected and actual shape.
pub fn generate_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);

    let mut output = String::new();
    output.push_str("--- expected (baseline)\n");
    output.push_str("+++ actual\n");

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(sign);
        output.push(' ');
        output.push_str(change.value());
        if !change.value().ends_with('\n') {
            output.push('\n');
        }
    }

    output
}

/// Save the current metrics as a baseline in the default directory.
pub fn save_baseline(name: &str, metrics: &MetricsBag) -> Result<PathBuf> {
    BaselineFile::from_metrics(name, metrics).save(name)
}

/// Compare current metrics against a saved baseline.
///
/// Honors `UPDATE_BASELINES=1` by rewriting instead of comparing.
pub fn assert_matches_baseline(name: &str, metrics: &MetricsBag) -> Result<()> {
    if should_update_baselines() {
        let path = save_baseline(name, metrics)?;
        eprintln!("Updated baseline: {}", path.display());
        Ok(())
    } else {
        BaselineFile::load(name)?.compare(metrics)
    }
}
