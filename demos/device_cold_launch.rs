//! Measure a cold launch on a connected device.
//!
//! Requires adb on PATH and a device with Settings installed.
//! Run with: cargo run --example device_cold_launch

use appstart_testlib::{cold_startup_key, Result, StartupTestHarness};

const PKG: &str = "com.android.settings";

fn main() -> Result<()> {
    let mut harness = StartupTestHarness::connect()?;

    harness.device().wake_and_unlock()?;
    harness.start_collecting()?;
    harness.cold_launch(PKG)?;

    let metrics = harness.metrics_snapshot();
    match metrics.get(&cold_startup_key(PKG)) {
        Some(millis) => println!("{} cold start: {}ms", PKG, millis),
        None => println!("no cold launch observed for {}", PKG),
    }

    harness.stop_collecting()?;
    Ok(())
}
