//! High-level test harness for app-startup metric collection.
//!
//! This module provides the main testing interface through
//! [`StartupTestHarness`]. It combines device control, logcat pumping, and
//! the metrics collector into an ergonomic API for driving launches and
//! waiting for the metrics they produce.
//!
//! # Key Features
//!
//! - **Device control**: force-stop, launch, key injection, display state
//! - **Metric collection**: start/stop sessions, snapshot accumulated metrics
//! - **Wait conditions**: block until the metric map reaches a state
//! - **Launch choreography**: one-call cold/warm/hot launch sequences
//! - **Flexible configuration**: builder for timeout/polling/settle settings
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::{
//!     cold_startup_key, LaunchKind, ScriptedDevice, StartupTestHarness,
//! };
//!
//! # fn test() -> appstart_testlib::Result<()> {
//! let scripted = ScriptedDevice::new();
//! scripted.script_launch("com.example.app", LaunchKind::Cold, 512);
//!
//! let mut harness = StartupTestHarness::scripted(&scripted);
//! harness.start_collecting()?;
//! harness.cold_launch("com.example.app")?;
//!
//! let metrics = harness.metrics_snapshot();
//! assert_eq!(metrics.values(&cold_startup_key("com.example.app")), vec!["512"]);
//! harness.stop_collecting()?;
//! # Ok(())
//! # }
//! # test().unwrap();
//! ```

use std::time::{Duration, Instant};

use crate::adb::{AdbShell, LogcatStream};
use crate::bridge::LogSource;
use crate::device::TestDevice;
use crate::error::{DeviceTestError, Result};
use crate::keys::KeyCode;
use crate::scripted::ScriptedDevice;
use crate::startup::{AppStartupCollector, LaunchKind, MetricsBag, TransitionFilter};

/// Default timeout for wait operations (5 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default polling interval for wait operations (100ms).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default settle delay between device actions (2 seconds).
///
/// Launch commands return before the launch completes; tests against a real
/// device give the device this long to quiesce between actions.
const DEFAULT_ACTION_DELAY: Duration = Duration::from_secs(2);

/// High-level harness driving a device and collecting startup metrics.
///
/// # Builder Pattern
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use appstart_testlib::StartupTestHarness;
///
/// let mut harness = StartupTestHarness::builder()
///     .with_serial("emulator-5554")
///     .with_timeout(Duration::from_secs(10))
///     .with_poll_interval(Duration::from_millis(50))
///     .build()?;
/// # Ok::<(), appstart_testlib::DeviceTestError>(())
/// ```
pub struct StartupTestHarness {
    device: TestDevice,
    log: Box<dyn LogSource + Send>,
    collector: AppStartupCollector,
    timeout: Duration,
    poll_interval: Duration,
    action_delay: Duration,
}

impl std::fmt::Debug for StartupTestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupTestHarness")
            .field("collector", &self.collector)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("action_delay", &self.action_delay)
            .finish_non_exhaustive()
    }
}

impl StartupTestHarness {
    /// Connects to the default adb device.
    ///
    /// # Errors
    ///
    /// Returns an error if the adb shell or logcat stream cannot be
    /// spawned.
    pub fn connect() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a harness over a scripted device (no adb required).
    pub fn scripted(device: &ScriptedDevice) -> Self {
        Self::builder().build_scripted(device)
    }

    /// Creates a builder for configuring a harness.
    pub fn builder() -> StartupHarnessBuilder {
        StartupHarnessBuilder::default()
    }

    /// Sets the timeout for wait operations.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the polling interval for wait operations.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the settle delay used between device actions.
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    /// Returns the device under test for direct command access.
    pub fn device(&mut self) -> &mut TestDevice {
        &mut self.device
    }

    /// Begins a metric collection session.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceTestError::CollectorAlreadyRunning`] if a session
    /// is already active.
    pub fn start_collecting(&mut self) -> Result<()> {
        self.collector.start_collecting()
    }

    /// Ends the metric collection session.
    ///
    /// Buffered log lines are pumped into the collector first so launches
    /// that completed just before the stop are not lost.
    pub fn stop_collecting(&mut self) -> Result<()> {
        let _ = self.pump();
        self.collector.stop_collecting()
    }

    /// Drains the log source into the collector.
    ///
    /// Called automatically by the snapshot and wait methods; call it
    /// manually when feeding assertions from [`collector`](Self::collector)
    /// directly.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceTestError::ShellExited`] once the log stream is gone
    /// and fully drained.
    pub fn pump(&mut self) -> Result<()> {
        for line in self.log.poll_lines()? {
            self.collector.feed_line(&line);
        }
        Ok(())
    }

    /// Returns the collector for direct metric access.
    pub fn collector(&self) -> &AppStartupCollector {
        &self.collector
    }

    /// Pumps pending log lines and clones the accumulated metrics.
    pub fn metrics_snapshot(&mut self) -> MetricsBag {
        // A dead log stream still leaves the accumulated metrics valid.
        let _ = self.pump();
        self.collector.metrics().clone()
    }

    /// Waits for a condition on the metric map, with timeout.
    ///
    /// Polls the log source at the configured interval and checks the
    /// condition against the accumulated metrics.
    ///
    /// # Errors
    ///
    /// Returns a `Timeout` error if the condition is not met within the
    /// configured timeout; the current metric map is dumped to stderr for
    /// debugging.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use appstart_testlib::StartupTestHarness;
    /// # let mut harness = StartupTestHarness::connect()?;
    /// harness.wait_for(|metrics| metrics.contains_key("cold_startup_total_count"))?;
    /// # Ok::<(), appstart_testlib::DeviceTestError>(())
    /// ```
    pub fn wait_for<F>(&mut self, condition: F) -> Result<()>
    where
        F: Fn(&MetricsBag) -> bool,
    {
        self.wait_for_with_context(condition, "condition")
    }

    /// Waits for a condition with a custom error context.
    ///
    /// # Errors
    ///
    /// Returns a `Timeout` error if the condition is not met in time.
    /// Returns `ShellExited` if the log stream dies before the condition
    /// is met.
    pub fn wait_for_with_context<F>(&mut self, condition: F, description: &str) -> Result<()>
    where
        F: Fn(&MetricsBag) -> bool,
    {
        let start = Instant::now();
        let mut iterations = 0;

        loop {
            match self.pump() {
                Ok(()) => {
                    if condition(self.collector.metrics()) {
                        return Ok(());
                    }
                }
                Err(DeviceTestError::ShellExited) => {
                    // Stream gone; check once against what was collected.
                    if condition(self.collector.metrics()) {
                        return Ok(());
                    }
                    self.dump_wait_state("Log stream exited while waiting for", description, start, iterations);
                    return Err(DeviceTestError::ShellExited);
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                self.dump_wait_state("Timeout waiting for", description, start, iterations);
                return Err(DeviceTestError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }

            iterations += 1;
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Waits for a metric key to appear.
    pub fn wait_for_metric_key(&mut self, key: &str) -> Result<()> {
        let key = key.to_string();
        let description = format!("metric key '{}'", key);
        self.wait_for_with_context(move |metrics| metrics.contains_key(&key), &description)
    }

    /// Waits for a metric key to hold at least `count` values.
    pub fn wait_for_value_count(&mut self, key: &str, count: usize) -> Result<()> {
        let key = key.to_string();
        let description = format!("{} values under '{}'", count, key);
        self.wait_for_with_context(
            move |metrics| metrics.values(&key).len() >= count,
            &description,
        )
    }

    /// Sleeps for the configured settle delay.
    pub fn settle(&self) {
        std::thread::sleep(self.action_delay);
    }

    /// Presses the home key.
    pub fn press_home(&mut self) -> Result<()> {
        self.device.send_keycode(KeyCode::Home)
    }

    /// Performs one cold launch of `package` and waits for its metric.
    ///
    /// Force-stops the package, settles, launches it, then waits for the
    /// cold launch-time key to gain a value.
    pub fn cold_launch(&mut self, package: &str) -> Result<()> {
        self.launch_and_wait(package, LaunchKind::Cold, |h, pkg| {
            h.device.force_stop(pkg)?;
            h.settle();
            h.device.launch_package(pkg)
        })
    }

    /// Performs one warm launch of `package` and waits for its metric.
    ///
    /// Sends the resident app to the background, drops caches, settles,
    /// then relaunches. The package must already have a live process for
    /// the transition to classify as warm.
    pub fn warm_launch(&mut self, package: &str) -> Result<()> {
        self.launch_and_wait(package, LaunchKind::Warm, |h, pkg| {
            h.press_home()?;
            h.device.drop_caches()?;
            h.settle();
            h.device.launch_package(pkg)
        })
    }

    /// Performs one hot launch of `package` and waits for its metric.
    ///
    /// Sends the resident app to the background and brings it straight
    /// back. The package's activity must already be resident for the
    /// transition to classify as hot.
    pub fn hot_launch(&mut self, package: &str) -> Result<()> {
        self.launch_and_wait(package, LaunchKind::Hot, |h, pkg| {
            h.press_home()?;
            h.settle();
            h.device.launch_package(pkg)
        })
    }

    /// Shared launch choreography: act, then wait for the kind's key to
    /// gain one value over its count before the launch.
    fn launch_and_wait<A>(&mut self, package: &str, kind: LaunchKind, act: A) -> Result<()>
    where
        A: FnOnce(&mut Self, &str) -> Result<()>,
    {
        let key = kind.startup_key(package);
        let _ = self.pump();
        let before = self.collector.metrics().values(&key).len();

        act(self, package)?;

        let description = format!("{} launch of {}", kind, package);
        self.wait_for_with_context(
            move |metrics| metrics.values(&key).len() > before,
            &description,
        )
    }

    fn dump_wait_state(&self, prefix: &str, description: &str, start: Instant, iterations: u32) {
        eprintln!("\n=== {} {} ===", prefix, description);
        eprintln!("Waited: {:?} ({} iterations)", start.elapsed(), iterations);
        eprintln!("Collecting: {}", self.collector.is_collecting());
        eprintln!("Current metrics:");
        if self.collector.is_empty() {
            eprintln!("  (empty)");
        }
        for (key, value) in self.collector.metrics().iter() {
            eprintln!("  {} = {}", key, value);
        }
        eprintln!("==========================================\n");
    }
}

/// Builder for [`StartupTestHarness`].
#[derive(Debug, Default)]
pub struct StartupHarnessBuilder {
    serial: Option<String>,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    action_delay: Option<Duration>,
    filter: Option<TransitionFilter>,
}

impl StartupHarnessBuilder {
    /// Pins the harness to a device serial.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Sets the timeout for wait operations.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the polling interval for wait operations.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the settle delay used between device actions.
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = Some(delay);
        self
    }

    /// Restricts which transition kinds the collector records.
    pub fn with_filter(mut self, filter: TransitionFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Builds a harness over a real adb device.
    ///
    /// # Errors
    ///
    /// Returns an error if the adb shell or logcat stream cannot be
    /// spawned.
    pub fn build(self) -> Result<StartupTestHarness> {
        let serial = self.serial.as_deref();
        let shell = AdbShell::connect_serial(serial)?;
        let logcat = LogcatStream::open_serial(serial)?;
        Ok(self.assemble(Box::new(shell), Box::new(logcat)))
    }

    /// Builds a harness over a scripted device.
    pub fn build_scripted(self, device: &ScriptedDevice) -> StartupTestHarness {
        self.assemble(Box::new(device.clone()), Box::new(device.clone()))
    }

    fn assemble(
        self,
        bridge: Box<dyn crate::bridge::DeviceBridge + Send>,
        log: Box<dyn LogSource + Send>,
    ) -> StartupTestHarness {
        let mut collector = AppStartupCollector::new();
        if let Some(filter) = self.filter {
            collector = collector.with_filter(filter);
        }
        StartupTestHarness {
            device: TestDevice::new(bridge),
            log,
            collector,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            action_delay: self.action_delay.unwrap_or(DEFAULT_ACTION_DELAY),
        }
    }
}
