//! Parsing of Android event-log output into typed launch events.
//!
//! This module decodes the `events` log buffer as printed by
//! `logcat -b events -v brief`, e.g.:
//!
//! ```text
//! I/wm_activity_launch_time( 1746): [0,189160407,com.android.settings/.Settings,958]
//! ```
//!
//! Only the tags involved in app-startup tracking are recognized; everything
//! else in the buffer (and there is a lot) is ignored. Malformed payloads for
//! recognized tags are ignored as well rather than reported as errors, since
//! logcat interleaves output from every process on the device and a single
//! torn line must never poison a collection session.
//!
//! # Example
//!
//! ```rust
//! use appstart_testlib::logcat::{parse_line, LogEvent};
//!
//! let line = "I/wm_activity_launch_time( 1746): [0,189160407,com.android.settings/.Settings,958]";
//! match parse_line(line) {
//!     Some(LogEvent::ActivityLaunchTime { component, millis }) => {
//!         assert_eq!(component.package, "com.android.settings");
//!         assert_eq!(millis, 958);
//!     }
//!     other => panic!("unexpected event: {:?}", other),
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::DeviceTestError;

/// An activity component, `package/class` as logged by the window manager.
///
/// The class part is kept exactly as logged; Android abbreviates classes
/// inside their own package with a leading dot (`com.foo/.MainActivity`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentName {
    /// The application package, e.g. `com.android.settings`.
    pub package: String,
    /// The activity class as written in the log, e.g. `.Settings`.
    pub class: String,
}

impl ComponentName {
    /// Creates a component from its parts.
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self { package: package.into(), class: class.into() }
    }

    /// Returns the fully-qualified activity class.
    ///
    /// Expands the leading-dot shorthand against the package name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use appstart_testlib::logcat::ComponentName;
    ///
    /// let c: ComponentName = "com.android.settings/.Settings".parse().unwrap();
    /// assert_eq!(c.full_class(), "com.android.settings.Settings");
    /// ```
    pub fn full_class(&self) -> String {
        if let Some(rest) = self.class.strip_prefix('.') {
            format!("{}.{}", self.package, rest)
        } else {
            self.class.clone()
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

impl FromStr for ComponentName {
    type Err = DeviceTestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (package, class) = s
            .split_once('/')
            .ok_or_else(|| DeviceTestError::Parse(format!("Not a component: {:?}", s)))?;
        if package.is_empty() || class.is_empty() {
            return Err(DeviceTestError::Parse(format!("Not a component: {:?}", s)));
        }
        Ok(Self::new(package, class))
    }
}

/// A recognized event from the device's `events` log buffer.
///
/// Each variant corresponds to one event-log tag written by the activity
/// manager / window manager during an app launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// `am_proc_start`: a new application process was forked.
    ProcStart {
        /// Package whose process started.
        package: String,
    },

    /// `am_proc_died`: an application process died or was killed.
    ProcDied {
        /// Package whose process died.
        package: String,
    },

    /// `wm_create_activity`: an activity record was created.
    CreateActivity {
        /// The created activity.
        component: ComponentName,
    },

    /// `wm_restart_activity`: a stopped activity was restarted.
    RestartActivity {
        /// The restarted activity.
        component: ComponentName,
    },

    /// `wm_resume_activity`: an activity was brought to the foreground.
    ResumeActivity {
        /// The resumed activity.
        component: ComponentName,
    },

    /// `wm_activity_launch_time`: launch completed; time to first frame.
    ActivityLaunchTime {
        /// The launched activity.
        component: ComponentName,
        /// Launch latency in milliseconds.
        millis: u64,
    },

    /// `wm_activity_fully_drawn_time`: the app called `reportFullyDrawn()`.
    FullyDrawnTime {
        /// The reporting activity.
        component: ComponentName,
        /// Time from launch to fully drawn, in milliseconds.
        millis: u64,
    },
}

impl LogEvent {
    /// Returns the package this event concerns.
    pub fn package(&self) -> &str {
        match self {
            LogEvent::ProcStart { package } | LogEvent::ProcDied { package } => package,
            LogEvent::CreateActivity { component }
            | LogEvent::RestartActivity { component }
            | LogEvent::ResumeActivity { component } => &component.package,
            LogEvent::ActivityLaunchTime { component, .. }
            | LogEvent::FullyDrawnTime { component, .. } => &component.package,
        }
    }
}

/// Matches a `brief`-format event-log line: priority/tag(pid): [payload]
fn line_regex() -> &'static Regex {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    LINE_RE.get_or_init(|| {
        Regex::new(r"^[VDIWEF]/(?P<tag>[a-z0-9_]+)\(\s*\d+\):\s*\[(?P<payload>.*)\]\s*$")
            .expect("event-log line regex is valid")
    })
}

/// Parses one logcat line into a [`LogEvent`].
///
/// Returns `None` for unrecognized tags, non-event lines, and recognized
/// tags whose payload does not decode.
pub fn parse_line(line: &str) -> Option<LogEvent> {
    let caps = line_regex().captures(line.trim_end())?;
    let tag = caps.name("tag")?.as_str();
    let fields: Vec<&str> = caps.name("payload")?.as_str().split(',').collect();

    match tag {
        // [User,PID,UID,Process Name,Type,Component]
        "am_proc_start" => {
            let package = fields.get(3)?.trim();
            (!package.is_empty()).then(|| LogEvent::ProcStart { package: package.to_string() })
        }
        // [User,PID,Process Name]
        "am_proc_died" => {
            let package = fields.get(2)?.trim();
            (!package.is_empty()).then(|| LogEvent::ProcDied { package: package.to_string() })
        }
        "wm_create_activity" => {
            Some(LogEvent::CreateActivity { component: component_field(&fields)? })
        }
        "wm_restart_activity" => {
            Some(LogEvent::RestartActivity { component: component_field(&fields)? })
        }
        "wm_resume_activity" => {
            Some(LogEvent::ResumeActivity { component: component_field(&fields)? })
        }
        "wm_activity_launch_time" => Some(LogEvent::ActivityLaunchTime {
            component: component_field(&fields)?,
            millis: trailing_millis(&fields)?,
        }),
        "wm_activity_fully_drawn_time" => Some(LogEvent::FullyDrawnTime {
            component: component_field(&fields)?,
            millis: trailing_millis(&fields)?,
        }),
        _ => None,
    }
}

/// Finds the component field in an event payload.
///
/// Payload layouts differ between platform releases, so the component is
/// located by shape (the only field containing a slash) rather than by index.
fn component_field(fields: &[&str]) -> Option<ComponentName> {
    fields
        .iter()
        .find(|f| f.contains('/'))
        .and_then(|f| f.trim().parse().ok())
}

/// The launch/fully-drawn duration is the last numeric field of the payload.
fn trailing_millis(fields: &[&str]) -> Option<u64> {
    fields.iter().rev().find_map(|f| f.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_launch_time() {
        let line =
            "I/wm_activity_launch_time( 1746): [0,189160407,com.android.settings/.Settings,958]";
        let event = parse_line(line).unwrap();

        assert_eq!(
            event,
            LogEvent::ActivityLaunchTime {
                component: ComponentName::new("com.android.settings", ".Settings"),
                millis: 958,
            }
        );
    }

    #[test]
    fn test_parse_fully_drawn_time() {
        let line =
            "I/wm_activity_fully_drawn_time( 1746): [0,189160407,com.android.settings/.Settings,2345]";
        let event = parse_line(line).unwrap();

        match event {
            LogEvent::FullyDrawnTime { component, millis } => {
                assert_eq!(component.package, "com.android.settings");
                assert_eq!(millis, 2345);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_proc_start() {
        let line = "I/am_proc_start( 1746): [0,31337,10068,com.google.android.calendar,activity,com.google.android.calendar/.AllInOneActivity]";
        let event = parse_line(line).unwrap();

        assert_eq!(event, LogEvent::ProcStart { package: "com.google.android.calendar".into() });
        assert_eq!(event.package(), "com.google.android.calendar");
    }

    #[test]
    fn test_parse_proc_died() {
        let line = "I/am_proc_died( 1746): [0,31337,com.google.android.calendar]";
        let event = parse_line(line).unwrap();

        assert_eq!(event, LogEvent::ProcDied { package: "com.google.android.calendar".into() });
    }

    #[test]
    fn test_parse_activity_lifecycle_tags() {
        let create = "I/wm_create_activity( 1746): [0,233651462,170,com.android.settings/.Settings,android.intent.action.MAIN]";
        let restart = "I/wm_restart_activity( 1746): [0,233651462,170,com.android.settings/.Settings]";
        let resume = "I/wm_resume_activity( 1746): [0,233651462,170,com.android.settings/.Settings]";

        assert!(matches!(parse_line(create), Some(LogEvent::CreateActivity { .. })));
        assert!(matches!(parse_line(restart), Some(LogEvent::RestartActivity { .. })));
        assert!(matches!(parse_line(resume), Some(LogEvent::ResumeActivity { .. })));
    }

    #[test]
    fn test_unrecognized_tag_ignored() {
        let line = "I/am_low_memory( 1746): [42]";
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn test_non_event_lines_ignored() {
        assert!(parse_line("").is_none());
        assert!(parse_line("--------- beginning of events").is_none());
        assert!(parse_line("garbage without structure").is_none());
    }

    #[test]
    fn test_malformed_payload_ignored() {
        // Recognized tag, but the payload carries no component.
        let line = "I/wm_activity_launch_time( 1746): [0,189160407]";
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn test_component_name_parsing() {
        let c: ComponentName = "com.android.settings/.Settings".parse().unwrap();
        assert_eq!(c.package, "com.android.settings");
        assert_eq!(c.class, ".Settings");
        assert_eq!(c.full_class(), "com.android.settings.Settings");
        assert_eq!(c.to_string(), "com.android.settings/.Settings");
    }

    #[test]
    fn test_component_name_fully_qualified() {
        let c: ComponentName = "com.foo/com.foo.bar.Main".parse().unwrap();
        assert_eq!(c.full_class(), "com.foo.bar.Main");
    }

    #[test]
    fn test_component_name_rejects_garbage() {
        assert!("no-slash-here".parse::<ComponentName>().is_err());
        assert!("/.Settings".parse::<ComponentName>().is_err());
        assert!("com.foo/".parse::<ComponentName>().is_err());
    }
}
