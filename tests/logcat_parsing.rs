//! Integration tests for headless stream-based collection.
//!
//! These tests demonstrate using the collector as a verification oracle by
//! feeding raw event-log output directly, without any device or harness.

use appstart_testlib::{
    cold_startup_key, fully_drawn_key, hot_startup_key, AppStartupCollector,
};

const PKG: &str = "com.android.settings";

#[test]
fn test_basic_launch_sequence() {
    let mut collector = AppStartupCollector::new();
    collector.start_collecting().unwrap();

    let input = b"I/am_proc_start( 1746): [0,31337,10068,com.android.settings,activity,com.android.settings/.Settings]\n\
I/wm_create_activity( 1746): [0,1,170,com.android.settings/.Settings,android.intent.action.MAIN]\n\
I/wm_resume_activity( 1746): [0,1,170,com.android.settings/.Settings]\n\
I/wm_activity_launch_time( 1746): [0,1,com.android.settings/.Settings,958]\n";
    collector.feed(input);

    let metrics = collector.metrics();
    assert_eq!(metrics.values(&cold_startup_key(PKG)), vec!["958"]);
    assert_eq!(metrics.count("cold_startup_total_count"), Some(1));
}

#[test]
fn test_incremental_stream_parsing() {
    let mut collector = AppStartupCollector::new();
    collector.start_collecting().unwrap();

    // Feed bytes incrementally (simulating streaming logcat output)
    collector.feed(b"I/wm_activity_launch_time( 1746): [0,1,");
    assert!(collector.is_empty(), "incomplete line must not record anything");

    collector.feed(b"com.android.settings/.Settings,4");
    assert!(collector.is_empty());

    collector.feed(b"20]\n");
    assert_eq!(collector.metrics().values(&hot_startup_key(PKG)), vec!["420"]);
}

#[test]
fn test_interleaved_unrelated_traffic() {
    let mut collector = AppStartupCollector::new();
    collector.start_collecting().unwrap();

    // The events buffer carries plenty of tags this crate does not track.
    collector.feed(
        b"--------- beginning of events\n\
I/am_low_memory( 1746): [42]\n\
I/battery_level( 1746): [97,4212,250]\n\
I/am_proc_start( 1746): [0,31337,10068,com.android.settings,activity,com.android.settings/.Settings]\n\
I/notification_cancel( 1746): [10068,29001,foo]\n\
I/wm_activity_launch_time( 1746): [0,1,com.android.settings/.Settings,958]\n",
    );

    let metrics = collector.metrics();
    assert_eq!(metrics.len(), 3, "one launch key and two counters");
    assert_eq!(metrics.values(&cold_startup_key(PKG)), vec!["958"]);
}

#[test]
fn test_torn_line_does_not_poison_stream() {
    let mut collector = AppStartupCollector::new();
    collector.start_collecting().unwrap();

    // A line truncated mid-payload, then normal traffic.
    collector.feed(b"I/wm_activity_launch_time( 1746): [0,1,com.android\n");
    collector.feed(b"I/wm_activity_launch_time( 1746): [0,1,com.android.settings/.Settings,512]\n");

    assert_eq!(collector.metrics().values(&hot_startup_key(PKG)), vec!["512"]);
}

#[test]
fn test_fully_drawn_stream() {
    let mut collector = AppStartupCollector::new();
    collector.start_collecting().unwrap();

    collector.feed(
        b"I/am_proc_start( 1746): [0,31337,10068,com.android.settings,activity,com.android.settings/.Settings]\n\
I/wm_activity_launch_time( 1746): [0,1,com.android.settings/.Settings,958]\n\
I/wm_activity_fully_drawn_time( 1746): [0,1,com.android.settings/.Settings,2345]\n",
    );

    assert_eq!(collector.metrics().values(&fully_drawn_key(PKG)), vec!["2345"]);
}

#[test]
fn test_two_packages_interleaved() {
    let other = "com.google.android.calendar";
    let mut collector = AppStartupCollector::new();
    collector.start_collecting().unwrap();

    collector.feed(
        b"I/am_proc_start( 1746): [0,31337,10068,com.android.settings,activity,com.android.settings/.Settings]\n\
I/am_proc_start( 1746): [0,31400,10102,com.google.android.calendar,activity,com.google.android.calendar/.AllInOneActivity]\n\
I/wm_activity_launch_time( 1746): [0,1,com.google.android.calendar/.AllInOneActivity,854]\n\
I/wm_activity_launch_time( 1746): [0,2,com.android.settings/.Settings,958]\n",
    );

    let metrics = collector.metrics();
    assert_eq!(metrics.values(&cold_startup_key(PKG)), vec!["958"]);
    assert_eq!(metrics.values(&cold_startup_key(other)), vec!["854"]);
    assert_eq!(metrics.count("cold_startup_total_count"), Some(2));
}
