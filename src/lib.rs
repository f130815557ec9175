//! # appstart_testlib
//!
//! A Rust library for integration testing of Android app-startup latency.
//!
//! ## Overview
//!
//! `appstart_testlib` drives an Android device through adb (killing and
//! launching packages, injecting key presses, controlling the display) and
//! collects the startup metrics those launches produce by parsing the
//! device's event-log buffer:
//!
//! - **Device control**: persistent `adb shell` session, no per-command
//!   process spawn overhead
//! - **Startup metrics**: cold/warm/hot launch times, launch counters, and
//!   fully-drawn timestamps, keyed by package
//! - **Launch classification**: cold/warm/hot derived from process-start
//!   and activity-lifecycle events
//! - **Wait conditions**: sleep-and-poll against the metric map with
//!   timeouts and debug dumps
//! - **Headless CI**: scripted devices run the full choreography with no
//!   device attached
//! - **Baselines**: saved metric shapes for regression detection
//!
//! ## Quick Start
//!
//! ### Against a connected device
//!
//! ```rust,no_run
//! use appstart_testlib::{cold_startup_key, Result, StartupTestHarness};
//!
//! fn measure_settings_cold_start() -> Result<()> {
//!     // Connect to the default adb device
//!     let mut harness = StartupTestHarness::connect()?;
//!
//!     harness.device().wake_and_unlock()?;
//!     harness.start_collecting()?;
//!
//!     // Kill, relaunch, and wait for the metric to land
//!     harness.cold_launch("com.android.settings")?;
//!
//!     let metrics = harness.metrics_snapshot();
//!     let key = cold_startup_key("com.android.settings");
//!     println!("cold start: {}ms", metrics.get(&key).unwrap_or("?"));
//!
//!     harness.stop_collecting()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Headless (no device required)
//!
//! For testing collection logic, or running this crate's own suite in CI,
//! a [`ScriptedDevice`] stands in for adb:
//!
//! ```rust
//! use appstart_testlib::{
//!     cold_startup_key, LaunchKind, ScriptedDevice, StartupTestHarness,
//! };
//!
//! let scripted = ScriptedDevice::new();
//! scripted.script_launch("com.example.app", LaunchKind::Cold, 512);
//!
//! let mut harness = StartupTestHarness::scripted(&scripted);
//! harness.start_collecting().unwrap();
//! harness.cold_launch("com.example.app").unwrap();
//!
//! let metrics = harness.metrics_snapshot();
//! assert_eq!(metrics.values(&cold_startup_key("com.example.app")), vec!["512"]);
//! ```
//!
//! ### Stream-based parsing
//!
//! The collector can also be fed raw log output directly, without any
//! harness:
//!
//! ```rust
//! use appstart_testlib::AppStartupCollector;
//!
//! let mut collector = AppStartupCollector::new();
//! collector.start_collecting().unwrap();
//! collector.feed(b"I/wm_activity_launch_time( 1746): [0,1,com.example.app/.Main,958]\n");
//! assert!(!collector.is_empty());
//! ```
//!
//! ## Feature Flags
//!
//! - `async-tokio`: Enable the Tokio async harness
//! - `json-report`: Enable JSON export of metric snapshots
//! - `full`: Everything above
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! 1. **adb transport** (`adb`): PTY-backed shell and logcat processes
//! 2. **Bridge seams** (`bridge`): swappable command/log-source traits
//! 3. **Log parsing** (`logcat`): event-buffer lines into typed events
//! 4. **Metric collection** (`startup`): launch classification and the
//!    string-keyed metric accumulator
//! 5. **Test harness** (`harness`): high-level choreography and waits
//!
//! Tests that need a device mark themselves `#[ignore]`; everything else in
//! the suite runs scripted.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

mod adb;
pub mod baseline;
mod bridge;
mod device;
mod error;
mod harness;
pub mod keys;
pub mod logcat;
mod scripted;
pub mod startup;
pub mod stats;

#[cfg(feature = "async-tokio")]
mod async_harness;

#[cfg(feature = "json-report")]
pub mod report;

// Public API exports
pub use adb::{AdbShell, LogcatStream};
#[cfg(feature = "async-tokio")]
pub use async_harness::{AsyncStartupHarness, AsyncWaitBuilder};
pub use baseline::{assert_matches_baseline, save_baseline, BaselineFile, BaselineMetadata};
pub use bridge::{DeviceBridge, LogSource};
pub use device::TestDevice;
pub use error::{DeviceTestError, Result};
pub use harness::{StartupHarnessBuilder, StartupTestHarness};
pub use keys::KeyCode;
pub use logcat::{ComponentName, LogEvent};
pub use scripted::ScriptedDevice;
pub use startup::{
    cold_startup_count_key, cold_startup_key, fully_drawn_key, hot_startup_key, warm_startup_key,
    AppStartupCollector, LaunchKind, MetricsBag, TransitionFilter, COLD_STARTUP_TOTAL_COUNT_KEY,
    FULLY_DRAWN_KEYWORD,
};
pub use stats::{stats_for, LatencyStats};
