//! Integration tests for the Tokio async harness.

#![cfg(feature = "async-tokio")]

use std::time::Duration;

use appstart_testlib::{
    cold_startup_key, AsyncStartupHarness, DeviceTestError, LaunchKind, ScriptedDevice,
    StartupTestHarness,
};

const PKG: &str = "com.example.app";

fn scripted_async(device: &ScriptedDevice) -> AsyncStartupHarness {
    let harness = StartupTestHarness::builder()
        .with_timeout(Duration::from_secs(1))
        .with_poll_interval(Duration::from_millis(5))
        .with_action_delay(Duration::ZERO)
        .build_scripted(device);
    AsyncStartupHarness::from_harness(harness)
}

#[tokio::test]
async fn test_async_cold_launch() {
    let device = ScriptedDevice::new();
    device.script_launch(PKG, LaunchKind::Cold, 512);

    let mut harness = scripted_async(&device);
    harness.start_collecting().await.unwrap();
    harness.cold_launch(PKG).await.unwrap();

    let metrics = harness.metrics_snapshot().await;
    assert_eq!(metrics.values(&cold_startup_key(PKG)), vec!["512"]);

    harness.stop_collecting().await.unwrap();
}

#[tokio::test]
async fn test_async_wait_for_pushed_metric() {
    let device = ScriptedDevice::new();
    let mut harness = scripted_async(&device);
    harness.start_collecting().await.unwrap();

    device.push_log_line(format!(
        "I/wm_activity_launch_time( 1746): [0,1,{PKG}/.Main,400]"
    ));

    harness
        .wait_for_async(|metrics| !metrics.is_empty())
        .timeout(Duration::from_secs(1))
        .poll_interval(Duration::from_millis(5))
        .execute()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_async_wait_times_out() {
    let device = ScriptedDevice::new();
    let mut harness = scripted_async(&device);
    harness.start_collecting().await.unwrap();

    let result = harness
        .wait_for_async(|metrics| metrics.contains_key("never_appears"))
        .timeout(Duration::from_millis(50))
        .poll_interval(Duration::from_millis(5))
        .execute()
        .await;

    assert!(matches!(result, Err(DeviceTestError::Timeout { .. })));
}

#[tokio::test]
async fn test_async_wait_for_metric_key() {
    let device = ScriptedDevice::new();
    let mut harness = scripted_async(&device);
    harness.start_collecting().await.unwrap();

    device.push_log_line(format!(
        "I/wm_activity_launch_time( 1746): [0,1,{PKG}/.Main,400]"
    ));
    harness
        .wait_for_metric_key(&format!("hot_startup_{}", PKG))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_async_device_commands() {
    let device = ScriptedDevice::new();
    let mut harness = scripted_async(&device);

    harness.force_stop(PKG).await.unwrap();
    harness
        .send_keycode(appstart_testlib::KeyCode::Home)
        .await
        .unwrap();

    assert!(device.executed_contains("am force-stop com.example.app"));
    assert!(device.executed_contains("KEYCODE_HOME"));
}
