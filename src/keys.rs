//! Android key event types and `input keyevent` encoding.
//!
//! This module provides a typed vocabulary for the keys a startup test
//! presses on the device, and converts them to the names and numeric codes
//! understood by the `input keyevent` shell command.
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::KeyCode;
//!
//! let home = KeyCode::Home;
//! assert_eq!(home.name(), "KEYCODE_HOME");
//! assert_eq!(home.code(), 3);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::DeviceTestError;

/// Represents an Android key.
///
/// This enum covers the keys commonly pressed during startup testing:
/// navigation out of an app (Home, Back), display power control
/// (Power, Wakeup, Sleep), and a few keys needed to drive simple UI flows.
///
/// # Example
///
/// ```rust
/// use appstart_testlib::KeyCode;
///
/// let home = KeyCode::Home;
/// let wake = KeyCode::Wakeup;
/// let up = KeyCode::DpadUp;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Home key. Sends the foreground app to the background.
    Home,

    /// Back key.
    Back,

    /// Power key. Toggles the display.
    Power,

    /// Wake-up key. Turns the display on without toggling.
    Wakeup,

    /// Sleep key. Turns the display off without toggling.
    Sleep,

    /// Menu key.
    Menu,

    /// Recent-apps (app switch) key.
    AppSwitch,

    /// Enter key.
    Enter,

    /// D-pad up.
    DpadUp,

    /// D-pad down.
    DpadDown,

    /// D-pad left.
    DpadLeft,

    /// D-pad right.
    DpadRight,
}

impl KeyCode {
    /// Returns the `KEYCODE_*` name accepted by `input keyevent`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use appstart_testlib::KeyCode;
    ///
    /// assert_eq!(KeyCode::AppSwitch.name(), "KEYCODE_APP_SWITCH");
    /// ```
    pub fn name(&self) -> &'static str {
        match self {
            KeyCode::Home => "KEYCODE_HOME",
            KeyCode::Back => "KEYCODE_BACK",
            KeyCode::Power => "KEYCODE_POWER",
            KeyCode::Wakeup => "KEYCODE_WAKEUP",
            KeyCode::Sleep => "KEYCODE_SLEEP",
            KeyCode::Menu => "KEYCODE_MENU",
            KeyCode::AppSwitch => "KEYCODE_APP_SWITCH",
            KeyCode::Enter => "KEYCODE_ENTER",
            KeyCode::DpadUp => "KEYCODE_DPAD_UP",
            KeyCode::DpadDown => "KEYCODE_DPAD_DOWN",
            KeyCode::DpadLeft => "KEYCODE_DPAD_LEFT",
            KeyCode::DpadRight => "KEYCODE_DPAD_RIGHT",
        }
    }

    /// Returns the numeric keycode as defined by `android.view.KeyEvent`.
    ///
    /// `input keyevent` accepts either form; the numeric code is useful when
    /// scripting against very old platform builds that predate a given name.
    pub fn code(&self) -> u16 {
        match self {
            KeyCode::Home => 3,
            KeyCode::Back => 4,
            KeyCode::DpadUp => 19,
            KeyCode::DpadDown => 20,
            KeyCode::DpadLeft => 21,
            KeyCode::DpadRight => 22,
            KeyCode::Power => 26,
            KeyCode::Enter => 66,
            KeyCode::Menu => 82,
            KeyCode::AppSwitch => 187,
            KeyCode::Sleep => 223,
            KeyCode::Wakeup => 224,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyCode {
    type Err = DeviceTestError;

    /// Parses either a `KEYCODE_*` name or a numeric code.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const ALL: [KeyCode; 12] = [
            KeyCode::Home,
            KeyCode::Back,
            KeyCode::Power,
            KeyCode::Wakeup,
            KeyCode::Sleep,
            KeyCode::Menu,
            KeyCode::AppSwitch,
            KeyCode::Enter,
            KeyCode::DpadUp,
            KeyCode::DpadDown,
            KeyCode::DpadLeft,
            KeyCode::DpadRight,
        ];

        if let Ok(num) = s.parse::<u16>() {
            if let Some(key) = ALL.iter().find(|k| k.code() == num) {
                return Ok(*key);
            }
        }
        ALL.iter()
            .find(|k| k.name() == s)
            .copied()
            .ok_or_else(|| DeviceTestError::Parse(format!("Unknown keycode: {:?}", s)))
    }
}
