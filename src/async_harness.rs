//! Async harness for startup testing using Tokio.
//!
//! This module provides [`AsyncStartupHarness`], which wraps the
//! synchronous [`StartupTestHarness`] to provide an async API compatible
//! with the Tokio runtime. Blocking device I/O runs on the blocking pool
//! via `spawn_blocking`, so launch choreography can be awaited alongside
//! other test activity.
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "async-tokio")]
//! # async fn test() -> appstart_testlib::Result<()> {
//! use appstart_testlib::AsyncStartupHarness;
//!
//! let mut harness = AsyncStartupHarness::connect().await?;
//! harness.start_collecting().await?;
//! harness.cold_launch("com.android.settings").await?;
//!
//! let metrics = harness.metrics_snapshot().await;
//! assert!(!metrics.is_empty());
//! # Ok(())
//! # }
//! ```

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::spawn_blocking;

use crate::{
    error::{DeviceTestError, Result},
    keys::KeyCode,
    startup::MetricsBag,
    StartupTestHarness,
};

/// Async wrapper around [`StartupTestHarness`].
///
/// The harness is wrapped in an `Arc<Mutex<...>>` and can be cloned to
/// share access across tasks.
#[derive(Debug, Clone)]
pub struct AsyncStartupHarness {
    inner: Arc<Mutex<StartupTestHarness>>,
}

impl AsyncStartupHarness {
    /// Connects to the default adb device.
    pub async fn connect() -> Result<Self> {
        let harness = spawn_blocking(StartupTestHarness::connect)
            .await
            .map_err(join_error)??;
        Ok(Self::from_harness(harness))
    }

    /// Wraps an already-built harness (including scripted ones).
    pub fn from_harness(harness: StartupTestHarness) -> Self {
        Self { inner: Arc::new(Mutex::new(harness)) }
    }

    /// Begins a metric collection session.
    pub async fn start_collecting(&mut self) -> Result<()> {
        self.blocking(|h| h.start_collecting()).await
    }

    /// Ends the metric collection session.
    pub async fn stop_collecting(&mut self) -> Result<()> {
        self.blocking(|h| h.stop_collecting()).await
    }

    /// Force-stops every process of `package`.
    pub async fn force_stop(&mut self, package: &str) -> Result<()> {
        let package = package.to_string();
        self.blocking(move |h| h.device().force_stop(&package)).await
    }

    /// Launches `package` via its launcher intent.
    pub async fn launch_package(&mut self, package: &str) -> Result<()> {
        let package = package.to_string();
        self.blocking(move |h| h.device().launch_package(&package)).await
    }

    /// Injects a key press.
    pub async fn send_keycode(&mut self, key: KeyCode) -> Result<()> {
        self.blocking(move |h| h.device().send_keycode(key)).await
    }

    /// Performs one cold launch of `package` and waits for its metric.
    pub async fn cold_launch(&mut self, package: &str) -> Result<()> {
        let package = package.to_string();
        self.blocking(move |h| h.cold_launch(&package)).await
    }

    /// Performs one warm launch of `package` and waits for its metric.
    pub async fn warm_launch(&mut self, package: &str) -> Result<()> {
        let package = package.to_string();
        self.blocking(move |h| h.warm_launch(&package)).await
    }

    /// Performs one hot launch of `package` and waits for its metric.
    pub async fn hot_launch(&mut self, package: &str) -> Result<()> {
        let package = package.to_string();
        self.blocking(move |h| h.hot_launch(&package)).await
    }

    /// Pumps pending log lines and clones the accumulated metrics.
    pub async fn metrics_snapshot(&self) -> MetricsBag {
        let inner = self.inner.clone();
        spawn_blocking(move || inner.lock().expect("harness lock poisoned").metrics_snapshot())
            .await
            .expect("metrics_snapshot task panicked")
    }

    /// Waits for a condition on the metric map.
    ///
    /// Returns a builder for configuring the wait operation.
    pub fn wait_for_async<F>(&self, condition: F) -> AsyncWaitBuilder<F>
    where
        F: Fn(&MetricsBag) -> bool + Send + Sync + 'static,
    {
        AsyncWaitBuilder::new(self.inner.clone(), condition)
    }

    /// Waits for a metric key to appear.
    pub async fn wait_for_metric_key(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.wait_for_async(move |metrics| metrics.contains_key(&key))
            .execute()
            .await
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StartupTestHarness) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        spawn_blocking(move || op(&mut inner.lock().expect("harness lock poisoned")))
            .await
            .map_err(join_error)?
    }
}

fn join_error(err: tokio::task::JoinError) -> DeviceTestError {
    DeviceTestError::Bridge(format!("blocking task failed: {}", err))
}

/// Builder for a single-condition async wait.
pub struct AsyncWaitBuilder<F> {
    harness: Arc<Mutex<StartupTestHarness>>,
    condition: F,
    timeout: Duration,
    poll_interval: Duration,
}

impl<F> std::fmt::Debug for AsyncWaitBuilder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWaitBuilder")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<F> AsyncWaitBuilder<F>
where
    F: Fn(&MetricsBag) -> bool + Send + Sync + 'static,
{
    fn new(harness: Arc<Mutex<StartupTestHarness>>, condition: F) -> Self {
        Self {
            harness,
            condition,
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Executes the wait operation.
    pub async fn execute(self) -> Result<()> {
        let start = tokio::time::Instant::now();
        let mut interval = tokio::time::interval(self.poll_interval);
        let condition = Arc::new(self.condition);

        loop {
            interval.tick().await;

            let harness = self.harness.clone();
            let cond = condition.clone();

            let is_met = spawn_blocking(move || {
                let mut h = harness.lock().expect("harness lock poisoned");
                match h.pump() {
                    Ok(()) | Err(DeviceTestError::ShellExited) => {}
                    Err(e) => return Err(e),
                }
                Ok(cond(h.collector().metrics()))
            })
            .await
            .map_err(join_error)??;

            if is_met {
                return Ok(());
            }

            if start.elapsed() >= self.timeout {
                return Err(DeviceTestError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedDevice;

    #[test]
    fn test_snapshot_through_blocking_pool() {
        let device = ScriptedDevice::new();
        device.push_log_line(
            "I/wm_activity_launch_time( 1746): [0,1,com.example.app/.Main,400]",
        );

        let mut sync = StartupTestHarness::builder()
            .with_action_delay(Duration::ZERO)
            .build_scripted(&device);
        sync.start_collecting().unwrap();

        let harness = AsyncStartupHarness::from_harness(sync);
        let metrics = tokio_test::block_on(harness.metrics_snapshot());
        assert!(!metrics.is_empty());
    }

    #[test]
    fn test_clones_share_the_harness() {
        let device = ScriptedDevice::new();
        let sync = StartupTestHarness::builder()
            .with_action_delay(Duration::ZERO)
            .build_scripted(&device);

        let mut a = AsyncStartupHarness::from_harness(sync);
        let b = a.clone();

        tokio_test::block_on(a.start_collecting()).unwrap();
        device.push_log_line(
            "I/wm_activity_launch_time( 1746): [0,1,com.example.app/.Main,400]",
        );
        let metrics = tokio_test::block_on(b.metrics_snapshot());
        assert!(!metrics.is_empty());
    }
}
