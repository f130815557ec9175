//! Trait seams between the harness and the device transport.
//!
//! The harness does not talk to adb directly; it goes through two narrow
//! traits so that tests can swap the real device for a scripted one (see
//! [`crate::scripted`]) and run the full launch choreography headless.
//!
//! - [`DeviceBridge`] is the command channel: run one shell command on the
//!   device, get its output back.
//! - [`LogSource`] is the observation channel: drain whatever complete log
//!   lines have arrived since the last poll.
//!
//! The real implementations are [`AdbShell`](crate::AdbShell) and
//! [`LogcatStream`](crate::LogcatStream).

use crate::error::Result;

/// A command channel to a device shell.
///
/// Implementations run a single shell command to completion and return its
/// combined output. Commands are plain `sh` syntax as understood by the
/// device's shell (`am force-stop com.foo`, `input keyevent KEYCODE_HOME`).
pub trait DeviceBridge {
    /// Executes one shell command on the device and returns its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is broken or the command did not
    /// complete within the transport's timeout. A command that runs and
    /// exits non-zero is not an error at this layer; callers that care
    /// inspect the output.
    fn execute(&mut self, command: &str) -> Result<String>;
}

/// A non-blocking source of device log lines.
///
/// Implementations buffer raw log output internally and hand out complete
/// lines; a partial trailing line is held back until its terminator
/// arrives.
pub trait LogSource {
    /// Drains the complete lines that arrived since the last poll.
    ///
    /// Returns an empty vector when no new lines are available; this is
    /// the common case inside a poll loop and not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceTestError::ShellExited`](crate::DeviceTestError::ShellExited)
    /// once the underlying stream is gone and fully drained.
    fn poll_lines(&mut self) -> Result<Vec<String>>;
}

impl<B: DeviceBridge + ?Sized> DeviceBridge for Box<B> {
    fn execute(&mut self, command: &str) -> Result<String> {
        (**self).execute(command)
    }
}

impl<S: LogSource + ?Sized> LogSource for Box<S> {
    fn poll_lines(&mut self) -> Result<Vec<String>> {
        (**self).poll_lines()
    }
}
