//! Error types for appstart_testlib.
//!
//! This module defines all error types that can occur during device testing
//! operations. The main error type [`DeviceTestError`] is an enum covering all
//! possible failure modes, and [`Result<T>`] is a type alias for convenience.
//!
//! # Examples
//!
//! ```rust
//! use appstart_testlib::{DeviceTestError, Result};
//!
//! fn may_fail() -> Result<()> {
//!     Err(DeviceTestError::Timeout { timeout_ms: 5000 })
//! }
//!
//! match may_fail() {
//!     Ok(_) => println!("Success"),
//!     Err(DeviceTestError::Timeout { timeout_ms }) => {
//!         eprintln!("Timed out after {}ms", timeout_ms);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Result type alias for appstart_testlib operations.
///
/// This is a convenience alias for `std::result::Result<T, DeviceTestError>`.
/// Most public APIs in this crate return this type.
pub type Result<T> = std::result::Result<T, DeviceTestError>;

/// Errors that can occur while driving a device or collecting startup metrics.
///
/// Each variant provides specific context about the failure.
#[derive(Debug, Error)]
pub enum DeviceTestError {
    /// Error from the device bridge transport.
    ///
    /// This covers low-level transport failures such as:
    /// - PTY allocation failures for the adb session
    /// - Broken pipes to the adb client
    /// - Malformed command framing on the shell channel
    #[error("Device bridge error: {0}")]
    Bridge(String),

    /// Standard I/O error.
    ///
    /// This wraps [`std::io::Error`] for file operations and other
    /// system-level I/O failures. Automatically converted via `From`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Timeout waiting for a condition.
    ///
    /// Returned when a wait operation (like
    /// `StartupTestHarness::wait_for`) exceeds its configured timeout.
    /// The error carries the timeout value for debugging.
    #[error("Timeout waiting for condition after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Error parsing device output.
    ///
    /// This occurs when a log line or shell response that was expected to
    /// follow a known format could not be decoded, or when a baseline file
    /// is malformed or fails to match.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Spawning the adb client failed.
    ///
    /// Typically the adb binary is not on `PATH`, the device serial does
    /// not resolve, or resource limits were exceeded.
    #[error("Failed to spawn adb: {0}")]
    SpawnFailed(String),

    /// The device shell session has exited.
    ///
    /// Returned when attempting to execute a command over an adb shell
    /// whose underlying process has terminated (device disconnected,
    /// adb server restarted). Prevents infinite loops in wait operations.
    #[error("Device shell session has exited")]
    ShellExited,

    /// Collection was started twice.
    ///
    /// Returned by `AppStartupCollector::start_collecting` when a
    /// collection session is already active.
    #[error("Startup metric collection is already running")]
    CollectorAlreadyRunning,

    /// Collection was stopped without being started.
    #[error("Startup metric collection is not running")]
    CollectorNotRunning,

    /// An invalid package name was supplied.
    ///
    /// Package names must be non-empty and free of shell metacharacters;
    /// anything else would be silently mangled by the device shell.
    #[error("Invalid package name: {name:?}")]
    InvalidPackage {
        /// The rejected package name.
        name: String,
    },
}

// Conversion from anyhow::Error (used by portable-pty)
impl From<anyhow::Error> for DeviceTestError {
    fn from(err: anyhow::Error) -> Self {
        DeviceTestError::Bridge(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test error");
        let err: DeviceTestError = io_err.into();

        assert!(matches!(err, DeviceTestError::Io(_)));
        assert!(err.to_string().contains("test error"));
    }

    #[test]
    fn test_timeout_error_message() {
        let err = DeviceTestError::Timeout { timeout_ms: 5000 };
        let msg = err.to_string();

        assert!(msg.contains("5000"));
        assert!(msg.contains("Timeout"));
    }

    #[test]
    fn test_spawn_failed_error() {
        let err = DeviceTestError::SpawnFailed("adb not found".to_string());
        let msg = err.to_string();

        assert!(msg.contains("Failed to spawn"));
        assert!(msg.contains("adb not found"));
    }

    #[test]
    fn test_collector_state_errors() {
        assert!(DeviceTestError::CollectorAlreadyRunning
            .to_string()
            .contains("already running"));
        assert!(DeviceTestError::CollectorNotRunning
            .to_string()
            .contains("not running"));
    }

    #[test]
    fn test_invalid_package_error() {
        let err = DeviceTestError::InvalidPackage { name: "a;b".to_string() };
        let msg = err.to_string();

        assert!(msg.contains("Invalid package"));
        assert!(msg.contains("a;b"));
    }

    #[test]
    fn test_anyhow_error_conversion() {
        let anyhow_err = anyhow::anyhow!("test anyhow error");
        let err: DeviceTestError = anyhow_err.into();

        assert!(matches!(err, DeviceTestError::Bridge(_)));
        assert!(err.to_string().contains("test anyhow error"));
    }

    #[test]
    fn test_shell_exited_error() {
        let err = DeviceTestError::ShellExited;
        let msg = err.to_string();

        assert!(msg.contains("exited"));
        assert!(msg.contains("shell"));
    }
}
