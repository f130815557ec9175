//! Headless walkthrough: scripted launches and the metric map.
//!
//! Run with: cargo run --example scripted_launches

use std::time::Duration;

use appstart_testlib::{
    stats::stats_for, cold_startup_key, LaunchKind, Result, ScriptedDevice, StartupTestHarness,
};

fn main() -> Result<()> {
    let device = ScriptedDevice::new();
    device.script_launch("com.example.app", LaunchKind::Cold, 512);
    device.script_launch("com.example.app", LaunchKind::Cold, 498);
    device.script_launch("com.example.app", LaunchKind::Hot, 64);

    let mut harness = StartupTestHarness::builder()
        .with_action_delay(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(5))
        .build_scripted(&device);

    harness.start_collecting()?;
    harness.cold_launch("com.example.app")?;
    harness.cold_launch("com.example.app")?;
    harness.hot_launch("com.example.app")?;
    harness.stop_collecting()?;

    let metrics = harness.metrics_snapshot();
    println!("Collected metrics:");
    for (key, value) in metrics.iter() {
        println!("  {} = {}", key, value);
    }

    if let Some(stats) = stats_for(&metrics, &cold_startup_key("com.example.app")) {
        println!("\n{}", stats.summary());
    }

    println!("\nCommands executed on the device:");
    for command in device.executed_commands() {
        println!("  $ {}", command);
    }

    Ok(())
}
