//! App-startup metric collection and launch classification.
//!
//! This module is the heart of the crate: [`AppStartupCollector`] consumes
//! raw event-log output (see [`crate::logcat`]) and accumulates structured
//! startup metrics keyed by package and transition kind, in the same
//! string-keyed, comma-joined form the platform's metric reporters use.
//!
//! # Launch classification
//!
//! The event log does not label a launch as cold, warm, or hot, so the
//! collector derives the kind from the events surrounding it:
//!
//! - **Cold**: an `am_proc_start` for the package precedes the launch;
//!   the app started with no existing process.
//! - **Warm**: the activity was created or restarted in an existing
//!   process (`wm_create_activity` / `wm_restart_activity`, no process
//!   start).
//! - **Hot**: the activity was only resumed, meaning it was already resident.
//!
//! Pending markers are consumed by the launch they explain, and a process
//! death clears them.
//!
//! # Metric keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `cold_startup_<pkg>` | comma-joined launch millis, one per cold launch |
//! | `warm_startup_<pkg>` | comma-joined launch millis, one per warm launch |
//! | `hot_startup_<pkg>` | comma-joined launch millis, one per hot launch |
//! | `cold_startup_count_<pkg>` | total cold launches of the package |
//! | `cold_startup_total_count` | total cold launches of any package |
//! | `fully_drawn_<pkg>` | comma-joined fully-drawn millis |
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::{cold_startup_key, AppStartupCollector};
//!
//! let mut collector = AppStartupCollector::new();
//! collector.start_collecting()?;
//!
//! collector.feed_line("I/am_proc_start( 1746): [0,31337,10068,com.example.app,activity,com.example.app/.Main]");
//! collector.feed_line("I/wm_activity_launch_time( 1746): [0,1,com.example.app/.Main,512]");
//!
//! let snapshot = collector.snapshot();
//! assert_eq!(snapshot.get(&cold_startup_key("com.example.app")).unwrap(), "512");
//! assert_eq!(snapshot.get("cold_startup_total_count").unwrap(), "1");
//! collector.stop_collecting()?;
//! # Ok::<(), appstart_testlib::DeviceTestError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitflags::bitflags;

use crate::error::{DeviceTestError, Result};
use crate::logcat::{parse_line, LogEvent};

/// Key for the total number of cold launches across all packages.
pub const COLD_STARTUP_TOTAL_COUNT_KEY: &str = "cold_startup_total_count";

/// Keyword present in every fully-drawn metric key.
pub const FULLY_DRAWN_KEYWORD: &str = "fully_drawn";

/// Formats the launch-time key for cold launches of `package`.
pub fn cold_startup_key(package: &str) -> String {
    format!("cold_startup_{}", package)
}

/// Formats the launch-time key for warm launches of `package`.
pub fn warm_startup_key(package: &str) -> String {
    format!("warm_startup_{}", package)
}

/// Formats the launch-time key for hot launches of `package`.
pub fn hot_startup_key(package: &str) -> String {
    format!("hot_startup_{}", package)
}

/// Formats the per-package cold launch counter key.
pub fn cold_startup_count_key(package: &str) -> String {
    format!("cold_startup_count_{}", package)
}

/// Formats the fully-drawn key for `package`.
pub fn fully_drawn_key(package: &str) -> String {
    format!("{}_{}", FULLY_DRAWN_KEYWORD, package)
}

/// The kind of app-launch transition.
///
/// See the module docs for how a kind is derived from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json-report", derive(serde::Serialize, serde::Deserialize))]
pub enum LaunchKind {
    /// App start with no existing process.
    Cold,
    /// App start reusing an existing process.
    Warm,
    /// App start bringing an already-resident activity to the foreground.
    Hot,
}

impl LaunchKind {
    /// Returns the lowercase name used in metric keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchKind::Cold => "cold",
            LaunchKind::Warm => "warm",
            LaunchKind::Hot => "hot",
        }
    }

    /// Formats the launch-time metric key for this kind and `package`.
    pub fn startup_key(&self, package: &str) -> String {
        format!("{}_startup_{}", self.as_str(), package)
    }
}

impl fmt::Display for LaunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Which transition kinds a collector records.
    ///
    /// Defaults to all kinds; restrict it to cut noise when a test only
    /// cares about one transition:
    ///
    /// ```rust
    /// use appstart_testlib::{AppStartupCollector, TransitionFilter};
    ///
    /// let collector = AppStartupCollector::new()
    ///     .with_filter(TransitionFilter::COLD);
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransitionFilter: u8 {
        /// Record cold launches.
        const COLD = 0b001;

        /// Record warm launches.
        const WARM = 0b010;

        /// Record hot launches.
        const HOT  = 0b100;
    }
}

impl TransitionFilter {
    fn accepts(&self, kind: LaunchKind) -> bool {
        match kind {
            LaunchKind::Cold => self.contains(TransitionFilter::COLD),
            LaunchKind::Warm => self.contains(TransitionFilter::WARM),
            LaunchKind::Hot => self.contains(TransitionFilter::HOT),
        }
    }
}

impl Default for TransitionFilter {
    fn default() -> Self {
        TransitionFilter::all()
    }
}

/// Accumulated metrics: string keys mapping to comma-joined value buffers.
///
/// Launch-time keys accumulate one value per launch; counter keys hold a
/// single integer rendered as a string. Iteration order is deterministic
/// (keys are sorted).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsBag {
    entries: BTreeMap<String, String>,
}

impl MetricsBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to the buffer under `key`, comma-separated.
    pub fn append(&mut self, key: &str, value: impl fmt::Display) {
        let slot = self.entries.entry(key.to_string()).or_default();
        if !slot.is_empty() {
            slot.push(',');
        }
        slot.push_str(&value.to_string());
    }

    /// Overwrites the value under `key`.
    pub fn set(&mut self, key: &str, value: impl fmt::Display) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    /// Returns the raw buffer under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the individual values accumulated under `key`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use appstart_testlib::MetricsBag;
    ///
    /// let mut bag = MetricsBag::new();
    /// bag.append("cold_startup_com.example", 512);
    /// bag.append("cold_startup_com.example", 498);
    /// assert_eq!(bag.values("cold_startup_com.example"), vec!["512", "498"]);
    /// ```
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.get(key).map(|v| v.split(',').collect()).unwrap_or_default()
    }

    /// Parses the buffer under `key` as a single integer counter.
    pub fn count(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over all keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over all entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys in the bag.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no metrics have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones the entries into a plain map.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Per-package evidence about what preceded the next launch event.
#[derive(Debug, Clone, Copy, Default)]
struct Pending {
    proc_started: bool,
    activity_created: bool,
}

/// Collects app-startup metrics from a stream of event-log lines.
///
/// The collector is a passive accumulator in the style of a stream parser:
/// something else (the harness, or a test) feeds it raw log output, and it
/// maintains the metric map. Input arriving outside a collection session is
/// ignored.
///
/// # Contract
///
/// - [`start_collecting`](Self::start_collecting) begins a session and
///   clears previous metrics; starting twice is an error.
/// - [`stop_collecting`](Self::stop_collecting) ends the session; the
///   accumulated metrics remain readable.
/// - Each launch event appends exactly one value to exactly one
///   launch-kind key; only cold launches maintain the counter keys.
#[derive(Debug, Clone, Default)]
pub struct AppStartupCollector {
    collecting: bool,
    bag: MetricsBag,
    pending: HashMap<String, Pending>,
    cold_counts: HashMap<String, u64>,
    cold_total: u64,
    filter: TransitionFilter,
    line_carry: String,
}

impl AppStartupCollector {
    /// Creates a collector recording all transition kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts which transition kinds are recorded.
    pub fn with_filter(mut self, filter: TransitionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Begins a collection session, clearing previously collected metrics.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceTestError::CollectorAlreadyRunning`] if a session is
    /// already active.
    pub fn start_collecting(&mut self) -> Result<()> {
        if self.collecting {
            return Err(DeviceTestError::CollectorAlreadyRunning);
        }
        self.bag.clear();
        self.pending.clear();
        self.cold_counts.clear();
        self.cold_total = 0;
        self.line_carry.clear();
        self.collecting = true;
        Ok(())
    }

    /// Ends the collection session. Metrics remain readable.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceTestError::CollectorNotRunning`] if no session is
    /// active.
    pub fn stop_collecting(&mut self) -> Result<()> {
        if !self.collecting {
            return Err(DeviceTestError::CollectorNotRunning);
        }
        self.collecting = false;
        Ok(())
    }

    /// Returns true while a collection session is active.
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Feeds raw log output, splitting it into lines.
    ///
    /// A partial trailing line is carried over and completed by the next
    /// call, so output may be fed in arbitrary chunks as it arrives from
    /// the device.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.line_carry.push_str(&String::from_utf8_lossy(bytes));
        // Consume complete lines, keep the unterminated tail.
        while let Some(newline) = self.line_carry.find('\n') {
            let line: String = self.line_carry.drain(..=newline).collect();
            self.feed_line(line.trim_end_matches(['\n', '\r']));
        }
    }

    /// Feeds one complete log line.
    pub fn feed_line(&mut self, line: &str) {
        if !self.collecting {
            return;
        }
        if let Some(event) = parse_line(line) {
            self.process_event(&event);
        }
    }

    /// Processes an already-parsed event.
    pub fn process_event(&mut self, event: &LogEvent) {
        if !self.collecting {
            return;
        }
        match event {
            LogEvent::ProcStart { package } => {
                self.pending.entry(package.clone()).or_default().proc_started = true;
            }
            LogEvent::ProcDied { package } => {
                self.pending.remove(package);
            }
            LogEvent::CreateActivity { component } | LogEvent::RestartActivity { component } => {
                self.pending
                    .entry(component.package.clone())
                    .or_default()
                    .activity_created = true;
            }
            // Resume happens during every transition; it carries no signal
            // beyond "a launch is in progress".
            LogEvent::ResumeActivity { .. } => {}
            LogEvent::ActivityLaunchTime { component, millis } => {
                let kind = self.classify(&component.package);
                self.record_launch(&component.package, kind, *millis);
            }
            LogEvent::FullyDrawnTime { component, millis } => {
                self.bag.append(&fully_drawn_key(&component.package), millis);
            }
        }
    }

    /// Derives the transition kind from pending evidence and consumes it.
    fn classify(&mut self, package: &str) -> LaunchKind {
        let pending = self.pending.remove(package).unwrap_or_default();
        if pending.proc_started {
            LaunchKind::Cold
        } else if pending.activity_created {
            LaunchKind::Warm
        } else {
            LaunchKind::Hot
        }
    }

    fn record_launch(&mut self, package: &str, kind: LaunchKind, millis: u64) {
        if !self.filter.accepts(kind) {
            return;
        }
        self.bag.append(&kind.startup_key(package), millis);

        if kind == LaunchKind::Cold {
            let count = self.cold_counts.entry(package.to_string()).or_insert(0);
            *count += 1;
            self.cold_total += 1;
            let count = *count;
            self.bag.set(&cold_startup_count_key(package), count);
            self.bag.set(COLD_STARTUP_TOTAL_COUNT_KEY, self.cold_total);
        }
    }

    /// Returns the accumulated metrics.
    pub fn metrics(&self) -> &MetricsBag {
        &self.bag
    }

    /// Clones the accumulated metrics into a plain map.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.bag.snapshot()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }
}
