//! Async harness walkthrough over a scripted device.
//!
//! Run with: cargo run --example async_wait --features async-tokio

use std::time::Duration;

use appstart_testlib::{
    cold_startup_key, AsyncStartupHarness, LaunchKind, Result, ScriptedDevice, StartupTestHarness,
};

#[tokio::main]
async fn main() -> Result<()> {
    let device = ScriptedDevice::new();
    device.script_launch("com.example.app", LaunchKind::Cold, 512);

    let harness = StartupTestHarness::builder()
        .with_action_delay(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(5))
        .build_scripted(&device);
    let mut harness = AsyncStartupHarness::from_harness(harness);

    harness.start_collecting().await?;
    harness.cold_launch("com.example.app").await?;

    harness
        .wait_for_async(|metrics| metrics.contains_key("cold_startup_total_count"))
        .timeout(Duration::from_secs(2))
        .execute()
        .await?;

    let metrics = harness.metrics_snapshot().await;
    println!(
        "cold start: {}ms",
        metrics.get(&cold_startup_key("com.example.app")).unwrap_or("?")
    );

    harness.stop_collecting().await?;
    Ok(())
}
