//! High-level device operations.
//!
//! [`TestDevice`] wraps a [`DeviceBridge`] with the shell commands a
//! startup test needs: killing and launching packages, key injection, and
//! display state control. It is transport-agnostic; hand it an
//! [`AdbShell`](crate::AdbShell) for a real device or a
//! [`ScriptedDevice`](crate::ScriptedDevice) for headless runs.
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::{KeyCode, ScriptedDevice, TestDevice};
//!
//! let scripted = ScriptedDevice::new();
//! let mut device = TestDevice::new(Box::new(scripted.clone()));
//!
//! device.force_stop("com.example.app")?;
//! device.send_keycode(KeyCode::Home)?;
//!
//! assert!(scripted.executed_contains("am force-stop com.example.app"));
//! assert!(scripted.executed_contains("input keyevent KEYCODE_HOME"));
//! # Ok::<(), appstart_testlib::DeviceTestError>(())
//! ```

use crate::bridge::DeviceBridge;
use crate::error::{DeviceTestError, Result};
use crate::keys::KeyCode;

/// A device under test, addressed through a [`DeviceBridge`].
pub struct TestDevice {
    bridge: Box<dyn DeviceBridge + Send>,
}

impl std::fmt::Debug for TestDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDevice").finish_non_exhaustive()
    }
}

impl TestDevice {
    /// Creates a device over the given bridge.
    pub fn new(bridge: Box<dyn DeviceBridge + Send>) -> Self {
        Self { bridge }
    }

    /// Runs a raw shell command on the device.
    pub fn shell(&mut self, command: &str) -> Result<String> {
        self.bridge.execute(command)
    }

    /// Force-stops every process of `package`.
    pub fn force_stop(&mut self, package: &str) -> Result<()> {
        validate_package(package)?;
        self.bridge.execute(&format!("am force-stop {}", package))?;
        Ok(())
    }

    /// Launches `package` via its launcher intent.
    ///
    /// Uses the monkey with an event count of one, which resolves the
    /// launcher activity without needing to know its class name.
    pub fn launch_package(&mut self, package: &str) -> Result<()> {
        validate_package(package)?;
        self.bridge.execute(&format!(
            "monkey -p {} -c android.intent.category.LAUNCHER 1",
            package
        ))?;
        Ok(())
    }

    /// Injects a key press.
    pub fn send_keycode(&mut self, key: KeyCode) -> Result<()> {
        self.bridge.execute(&format!("input keyevent {}", key.name()))?;
        Ok(())
    }

    /// Turns the display on and dismisses the keyguard.
    pub fn wake_and_unlock(&mut self) -> Result<()> {
        self.send_keycode(KeyCode::Wakeup)?;
        self.bridge.execute("wm dismiss-keyguard")?;
        Ok(())
    }

    /// Drops the kernel page cache.
    ///
    /// Run between launches of a resident app to make the next start read
    /// from storage again (the warm-launch setup).
    pub fn drop_caches(&mut self) -> Result<()> {
        self.bridge.execute("sync; echo 3 > /proc/sys/vm/drop_caches")?;
        Ok(())
    }

    /// Returns true if the display is on.
    pub fn is_screen_on(&mut self) -> Result<bool> {
        let output = self
            .bridge
            .execute("dumpsys power | grep -E 'mWakefulness=|Display Power: state='")?;
        Ok(output.contains("mWakefulness=Awake") || output.contains("state=ON"))
    }
}

/// Rejects package names the device shell would mangle.
fn validate_package(package: &str) -> Result<()> {
    let valid = !package.is_empty()
        && package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DeviceTestError::InvalidPackage { name: package.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedDevice;

    fn scripted_device() -> (ScriptedDevice, TestDevice) {
        let scripted = ScriptedDevice::new();
        let device = TestDevice::new(Box::new(scripted.clone()));
        (scripted, device)
    }

    #[test]
    fn test_force_stop_command() {
        let (scripted, mut device) = scripted_device();
        device.force_stop("com.example.app").unwrap();

        assert_eq!(scripted.executed_commands(), vec!["am force-stop com.example.app"]);
    }

    #[test]
    fn test_launch_package_command() {
        let (scripted, mut device) = scripted_device();
        device.launch_package("com.example.app").unwrap();

        assert!(scripted.executed_contains(
            "monkey -p com.example.app -c android.intent.category.LAUNCHER 1"
        ));
    }

    #[test]
    fn test_send_keycode_command() {
        let (scripted, mut device) = scripted_device();
        device.send_keycode(KeyCode::AppSwitch).unwrap();

        assert!(scripted.executed_contains("input keyevent KEYCODE_APP_SWITCH"));
    }

    #[test]
    fn test_wake_and_unlock_commands() {
        let (scripted, mut device) = scripted_device();
        device.wake_and_unlock().unwrap();

        let commands = scripted.executed_commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].contains("KEYCODE_WAKEUP"));
        assert!(commands[1].contains("dismiss-keyguard"));
    }

    #[test]
    fn test_drop_caches_command() {
        let (scripted, mut device) = scripted_device();
        device.drop_caches().unwrap();

        assert!(scripted.executed_contains("drop_caches"));
    }

    #[test]
    fn test_is_screen_on() {
        let (scripted, mut device) = scripted_device();
        scripted.set_response("dumpsys power", "mWakefulness=Awake");

        assert!(device.is_screen_on().unwrap());
    }

    #[test]
    fn test_is_screen_off() {
        let (scripted, mut device) = scripted_device();
        scripted.set_response("dumpsys power", "mWakefulness=Asleep");

        assert!(!device.is_screen_on().unwrap());
    }

    #[test]
    fn test_invalid_package_rejected() {
        let (_, mut device) = scripted_device();

        assert!(matches!(
            device.force_stop(""),
            Err(DeviceTestError::InvalidPackage { .. })
        ));
        assert!(matches!(
            device.launch_package("com.foo; rm -rf /"),
            Err(DeviceTestError::InvalidPackage { .. })
        ));
    }
}
