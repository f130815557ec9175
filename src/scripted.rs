//! Scripted device for headless testing.
//!
//! [`ScriptedDevice`] implements both [`DeviceBridge`] and [`LogSource`]
//! without touching adb, so the full launch choreography, including this
//! crate's own test suite, runs on machines with no device attached. It plays the
//! same role the stream-based parsing mode plays for terminal testing:
//! feed known input, verify the derived state.
//!
//! A scripted device does two things:
//!
//! - records every shell command the harness executes, for asserting the
//!   device-command side of a scenario;
//! - emits pre-scripted event-log lines, either immediately
//!   ([`push_log_line`](ScriptedDevice::push_log_line)) or queued per
//!   package and released when the harness issues that package's launch
//!   command ([`script_launch`](ScriptedDevice::script_launch)).
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::{DeviceBridge, LaunchKind, LogSource, ScriptedDevice};
//!
//! let mut device = ScriptedDevice::new();
//! device.script_launch("com.example.app", LaunchKind::Cold, 512);
//!
//! // Nothing is emitted until the launch command runs.
//! assert!(device.poll_lines().unwrap().is_empty());
//!
//! device.execute("monkey -p com.example.app -c android.intent.category.LAUNCHER 1").unwrap();
//! let lines = device.poll_lines().unwrap();
//! assert!(lines.iter().any(|l| l.contains("wm_activity_launch_time")));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::bridge::{DeviceBridge, LogSource};
use crate::error::Result;
use crate::startup::LaunchKind;

/// One scripted launch: the event-log lines it will emit.
#[derive(Debug, Clone)]
struct ScriptedLaunch {
    lines: Vec<String>,
}

#[derive(Debug, Default)]
struct ScriptedInner {
    executed: Vec<String>,
    pending_lines: VecDeque<String>,
    responses: Vec<(String, String)>,
    launches: HashMap<String, VecDeque<ScriptedLaunch>>,
}

/// A fake device: command recorder plus scripted log emitter.
///
/// Cloning produces another handle to the same device, which is how one
/// scripted device serves as both the harness's [`DeviceBridge`] and its
/// [`LogSource`] while the test keeps a third handle for assertions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    inner: Arc<Mutex<ScriptedInner>>,
}

impl ScriptedDevice {
    /// Creates an empty scripted device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw log line for the next poll.
    pub fn push_log_line(&self, line: impl Into<String>) {
        self.lock().pending_lines.push_back(line.into());
    }

    /// Queues several raw log lines for the next poll.
    pub fn push_log_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.lock();
        for line in lines {
            inner.pending_lines.push_back(line.into());
        }
    }

    /// Scripts the next launch of `package` as `kind` taking `millis`.
    ///
    /// The launch's event-log lines are emitted when a launch command for
    /// the package (`monkey -p <pkg> …` or `am start`) is executed.
    /// Multiple scripted launches for one package play back in FIFO order.
    pub fn script_launch(&self, package: &str, kind: LaunchKind, millis: u64) {
        self.script(package, kind, millis, None);
    }

    /// Like [`script_launch`](Self::script_launch), with the app reporting
    /// fully drawn `fully_drawn_millis` after launch.
    pub fn script_launch_fully_drawn(
        &self,
        package: &str,
        kind: LaunchKind,
        millis: u64,
        fully_drawn_millis: u64,
    ) {
        self.script(package, kind, millis, Some(fully_drawn_millis));
    }

    fn script(&self, package: &str, kind: LaunchKind, millis: u64, fully_drawn: Option<u64>) {
        let component = format!("{}/.MainActivity", package);
        let mut lines = Vec::new();

        match kind {
            LaunchKind::Cold => {
                lines.push(format!(
                    "I/am_proc_start( 1746): [0,31337,10068,{package},activity,{component}]"
                ));
                lines.push(format!(
                    "I/wm_create_activity( 1746): [0,1,170,{component},android.intent.action.MAIN]"
                ));
            }
            LaunchKind::Warm => {
                lines.push(format!("I/wm_restart_activity( 1746): [0,1,170,{component}]"));
            }
            LaunchKind::Hot => {}
        }
        lines.push(format!("I/wm_resume_activity( 1746): [0,1,170,{component}]"));
        lines.push(format!("I/wm_activity_launch_time( 1746): [0,1,{component},{millis}]"));
        if let Some(fd) = fully_drawn {
            lines.push(format!(
                "I/wm_activity_fully_drawn_time( 1746): [0,1,{component},{fd}]"
            ));
        }

        self.lock()
            .launches
            .entry(package.to_string())
            .or_default()
            .push_back(ScriptedLaunch { lines });
    }

    /// Sets a canned response for commands starting with `prefix`.
    ///
    /// Without a match, commands return an empty string, which is what the
    /// device commands used by the harness produce on success anyway.
    pub fn set_response(&self, prefix: impl Into<String>, output: impl Into<String>) {
        self.lock().responses.push((prefix.into(), output.into()));
    }

    /// Returns every command executed so far, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Returns true if some executed command contains `needle`.
    pub fn executed_contains(&self, needle: &str) -> bool {
        self.lock().executed.iter().any(|c| c.contains(needle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedInner> {
        self.inner.lock().expect("scripted device lock poisoned")
    }

    /// True if `command` launches `package`.
    fn is_launch_of(command: &str, package: &str) -> bool {
        (command.starts_with("monkey -p ") || command.starts_with("am start"))
            && command.contains(package)
    }
}

impl DeviceBridge for ScriptedDevice {
    fn execute(&mut self, command: &str) -> Result<String> {
        let mut inner = self.lock();
        inner.executed.push(command.to_string());

        // A launch command releases the next scripted launch for its package.
        let released: Vec<String> = inner
            .launches
            .iter_mut()
            .filter(|(pkg, _)| Self::is_launch_of(command, pkg))
            .filter_map(|(_, queue)| queue.pop_front())
            .flat_map(|launch| launch.lines)
            .collect();
        inner.pending_lines.extend(released);

        let response = inner
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();
        Ok(response)
    }
}

impl LogSource for ScriptedDevice {
    fn poll_lines(&mut self) -> Result<Vec<String>> {
        Ok(self.lock().pending_lines.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKG: &str = "com.example.app";

    #[test]
    fn test_records_executed_commands() {
        let mut device = ScriptedDevice::new();
        device.execute("am force-stop com.example.app").unwrap();
        device.execute("input keyevent KEYCODE_HOME").unwrap();

        assert_eq!(
            device.executed_commands(),
            vec!["am force-stop com.example.app", "input keyevent KEYCODE_HOME"]
        );
        assert!(device.executed_contains("force-stop"));
        assert!(!device.executed_contains("reboot"));
    }

    #[test]
    fn test_canned_responses_by_prefix() {
        let mut device = ScriptedDevice::new();
        device.set_response("dumpsys power", "mWakefulness=Awake");

        assert_eq!(device.execute("dumpsys power").unwrap(), "mWakefulness=Awake");
        assert_eq!(device.execute("am force-stop com.foo").unwrap(), "");
    }

    #[test]
    fn test_pushed_lines_drain_once() {
        let mut device = ScriptedDevice::new();
        device.push_log_line("line one");
        device.push_log_lines(["line two", "line three"]);

        assert_eq!(device.poll_lines().unwrap().len(), 3);
        assert!(device.poll_lines().unwrap().is_empty());
    }

    #[test]
    fn test_scripted_launch_released_by_launch_command() {
        let mut device = ScriptedDevice::new();
        device.script_launch(PKG, LaunchKind::Cold, 512);

        assert!(device.poll_lines().unwrap().is_empty());
        device.execute("am force-stop com.example.app").unwrap();
        assert!(device.poll_lines().unwrap().is_empty(), "force-stop is not a launch");

        device
            .execute("monkey -p com.example.app -c android.intent.category.LAUNCHER 1")
            .unwrap();
        let lines = device.poll_lines().unwrap();

        assert!(lines.iter().any(|l| l.contains("am_proc_start")));
        assert!(lines.iter().any(|l| l.contains("wm_activity_launch_time")));
        assert!(lines.iter().any(|l| l.contains("512")));
    }

    #[test]
    fn test_scripted_launches_fifo_per_package() {
        let mut device = ScriptedDevice::new();
        device.script_launch(PKG, LaunchKind::Cold, 500);
        device.script_launch(PKG, LaunchKind::Hot, 60);

        device.execute(&format!("monkey -p {} 1", PKG)).unwrap();
        let first = device.poll_lines().unwrap();
        assert!(first.iter().any(|l| l.contains("am_proc_start")));

        device.execute(&format!("monkey -p {} 1", PKG)).unwrap();
        let second = device.poll_lines().unwrap();
        assert!(!second.iter().any(|l| l.contains("am_proc_start")));
        assert!(second.iter().any(|l| l.contains(",60]")));
    }

    #[test]
    fn test_fully_drawn_scripting() {
        let mut device = ScriptedDevice::new();
        device.script_launch_fully_drawn(PKG, LaunchKind::Cold, 512, 2345);

        device.execute(&format!("monkey -p {} 1", PKG)).unwrap();
        let lines = device.poll_lines().unwrap();
        assert!(lines.iter().any(|l| l.contains("wm_activity_fully_drawn_time")));
    }

    #[test]
    fn test_clones_share_state() {
        let device = ScriptedDevice::new();
        let mut bridge_handle = device.clone();
        let mut log_handle = device.clone();

        device.push_log_line("shared");
        bridge_handle.execute("am force-stop com.foo").unwrap();

        assert_eq!(log_handle.poll_lines().unwrap(), vec!["shared"]);
        assert!(device.executed_contains("force-stop"));
    }
}
