//! Run configuration and the persisted settings file.
//!
//! [`RunConfig`] is the immutable snapshot a run works from. [`Settings`] is
//! the JSON file the CLI loads it from, together with the hotkey bindings.

use crate::error::{ClickerError, Result};
use crate::platform::{Platform, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted absolute value for a fixed target coordinate.
pub const MAX_COORDINATE: i32 = 20_000;

/// Longest accepted delay between clicks.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted safety countdown.
pub const MAX_COUNTDOWN: Duration = Duration::from_secs(60 * 60);

/// Quick interval choices offered to users.
pub const INTERVAL_PRESETS: [Duration; 10] = [
    Duration::from_millis(1),
    Duration::from_millis(5),
    Duration::from_millis(10),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
];

/// What a single tick clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickKind {
    #[default]
    Left,
    Right,
    /// Two left clicks in quick succession, counted as two clicks.
    DoubleLeft,
}

impl FromStr for ClickKind {
    type Err = ClickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(ClickKind::Left),
            "right" | "r" => Ok(ClickKind::Right),
            "double" | "double-left" | "double_left" | "d" => Ok(ClickKind::DoubleLeft),
            other => Err(ClickerError::config_validation(format!(
                "unknown click kind '{}', expected left, right or double",
                other
            ))),
        }
    }
}

/// How many clicks a run performs before finishing on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickLimit {
    Finite(u64),
    Continuous,
}

impl ClickLimit {
    pub fn is_reached(self, clicks_done: u64) -> bool {
        match self {
            ClickLimit::Finite(n) => clicks_done >= n,
            ClickLimit::Continuous => false,
        }
    }

    /// Clicks still allowed, or `None` when unbounded.
    pub fn remaining(self, clicks_done: u64) -> Option<u64> {
        match self {
            ClickLimit::Finite(n) => Some(n.saturating_sub(clicks_done)),
            ClickLimit::Continuous => None,
        }
    }
}

/// Where each click lands. Resolved afresh on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    FollowCursor,
    FixedPoint(Point),
    ScreenCenter,
    ActiveWindowCenter,
}

impl TargetMode {
    pub fn kind(self) -> TargetKind {
        match self {
            TargetMode::FollowCursor => TargetKind::FollowCursor,
            TargetMode::FixedPoint(_) => TargetKind::FixedPoint,
            TargetMode::ScreenCenter => TargetKind::ScreenCenter,
            TargetMode::ActiveWindowCenter => TargetKind::ActiveWindowCenter,
        }
    }
}

/// Targeting mode without its coordinates, as stored in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    #[default]
    FollowCursor,
    FixedPoint,
    ScreenCenter,
    ActiveWindowCenter,
}

impl TargetKind {
    pub fn with_point(self, point: Point) -> TargetMode {
        match self {
            TargetKind::FollowCursor => TargetMode::FollowCursor,
            TargetKind::FixedPoint => TargetMode::FixedPoint(point),
            TargetKind::ScreenCenter => TargetMode::ScreenCenter,
            TargetKind::ActiveWindowCenter => TargetMode::ActiveWindowCenter,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::FollowCursor => "follow-cursor",
            TargetKind::FixedPoint => "fixed-point",
            TargetKind::ScreenCenter => "screen-center",
            TargetKind::ActiveWindowCenter => "active-window-center",
        };
        f.write_str(name)
    }
}

impl FromStr for TargetKind {
    type Err = ClickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "follow" | "cursor" | "follow-cursor" => Ok(TargetKind::FollowCursor),
            "fixed" | "point" | "fixed-point" => Ok(TargetKind::FixedPoint),
            "screen" | "screen-center" => Ok(TargetKind::ScreenCenter),
            "window" | "window-center" | "active-window-center" => {
                Ok(TargetKind::ActiveWindowCenter)
            }
            other => Err(ClickerError::config_validation(format!(
                "unknown target mode '{}'",
                other
            ))),
        }
    }
}

/// Snapshot of everything a run needs. Copied into the scheduler at Start
/// and never changed for the lifetime of that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub interval: Duration,
    pub kind: ClickKind,
    pub limit: ClickLimit,
    pub countdown: Duration,
    pub target: TargetMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            kind: ClickKind::Left,
            limit: ClickLimit::Finite(100),
            countdown: Duration::ZERO,
            target: TargetMode::FollowCursor,
        }
    }
}

impl RunConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: ClickKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_limit(mut self, limit: ClickLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn with_target(mut self, target: TargetMode) -> Self {
        self.target = target;
        self
    }

    /// Check the values on their own, independent of any platform.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ClickerError::config_validation(
                "interval must be greater than zero",
            ));
        }

        if self.interval > MAX_INTERVAL {
            return Err(ClickerError::config_validation(format!(
                "interval {} is longer than the {} maximum",
                format_duration(self.interval),
                format_duration(MAX_INTERVAL)
            )));
        }

        if self.countdown > MAX_COUNTDOWN {
            return Err(ClickerError::config_validation(format!(
                "countdown {} is longer than the {} maximum",
                format_duration(self.countdown),
                format_duration(MAX_COUNTDOWN)
            )));
        }

        if self.limit == ClickLimit::Finite(0) {
            return Err(ClickerError::config_validation(
                "click count must be at least 1",
            ));
        }

        if let TargetMode::FixedPoint(p) = self.target {
            if p.x.abs() > MAX_COORDINATE || p.y.abs() > MAX_COORDINATE {
                return Err(ClickerError::config_validation(format!(
                    "target {} is out of range (±{})",
                    p, MAX_COORDINATE
                )));
            }
        }

        Ok(())
    }

    /// Reject targeting modes the platform can never satisfy, so the
    /// problem shows up at Start instead of on every tick.
    pub fn check_supported(&self, platform: &dyn Platform) -> Result<()> {
        if self.target == TargetMode::ActiveWindowCenter && !platform.supports_active_window() {
            return Err(ClickerError::unsupported_target(
                TargetKind::ActiveWindowCenter.to_string(),
            ));
        }
        Ok(())
    }
}

/// Hotkey chords for the four global signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeySettings {
    #[serde(default = "default_start_hotkey")]
    pub start: String,
    #[serde(default = "default_stop_hotkey")]
    pub stop: String,
    #[serde(default = "default_pick_hotkey")]
    pub pick: String,
    #[serde(default = "default_panic_hotkey")]
    pub panic: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            start: default_start_hotkey(),
            stop: default_stop_hotkey(),
            pick: default_pick_hotkey(),
            panic: default_panic_hotkey(),
        }
    }
}

/// Settings file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(with = "duration_format", default = "default_interval")]
    pub interval: Duration,
    #[serde(default)]
    pub kind: ClickKind,
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default)]
    pub continuous: bool,
    #[serde(with = "duration_format", default = "default_countdown")]
    pub countdown: Duration,
    #[serde(default)]
    pub target: TargetKind,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub hotkeys: HotkeySettings,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            kind: ClickKind::default(),
            count: default_count(),
            continuous: false,
            countdown: default_countdown(),
            target: TargetKind::default(),
            x: 0,
            y: 0,
            hotkeys: HotkeySettings::default(),
            verbose: false,
        }
    }
}

impl Settings {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ClickerError::config_load(path, e.to_string()))?;
        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| ClickerError::config_load(path, e.to_string()))?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ClickerError::config_save(path, e.to_string()))?;
        Ok(())
    }

    pub fn run_config(&self) -> RunConfig {
        let limit = if self.continuous {
            ClickLimit::Continuous
        } else {
            ClickLimit::Finite(self.count)
        };
        RunConfig {
            interval: self.interval,
            kind: self.kind,
            limit,
            countdown: self.countdown,
            target: self.target.with_point(Point::new(self.x, self.y)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.run_config().validate()?;

        let chords = [
            ("start", &self.hotkeys.start),
            ("stop", &self.hotkeys.stop),
            ("pick", &self.hotkeys.pick),
            ("panic", &self.hotkeys.panic),
        ];
        for (i, (name, chord)) in chords.iter().enumerate() {
            if chord.trim().is_empty() {
                return Err(ClickerError::config_validation(format!(
                    "{} hotkey cannot be empty",
                    name
                )));
            }
            for (other, other_chord) in &chords[i + 1..] {
                if chord.trim().eq_ignore_ascii_case(other_chord.trim()) {
                    return Err(ClickerError::config_validation(format!(
                        "{} and {} hotkeys are both '{}'",
                        name, other, chord
                    )));
                }
            }
        }

        Ok(())
    }
}

fn default_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_count() -> u64 {
    100
}

fn default_countdown() -> Duration {
    Duration::from_secs(3)
}

fn default_start_hotkey() -> String {
    "f5".to_string()
}

fn default_stop_hotkey() -> String {
    "f6".to_string()
}

fn default_pick_hotkey() -> String {
    "f8".to_string()
}

fn default_panic_hotkey() -> String {
    "escape".to_string()
}

/// Parse "500ms", "2s", "5m" or a bare millisecond count.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(ClickerError::invalid_duration(value, "empty duration"));
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(ClickerError::invalid_duration(
            value,
            "expected a non-negative number",
        ));
    }

    let amount: u64 = number
        .parse()
        .map_err(|e: std::num::ParseIntError| ClickerError::invalid_duration(value, e.to_string()))?;

    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        other => Err(ClickerError::invalid_duration(
            value,
            format!("unknown unit '{}'", other),
        )),
    }
}

/// Render a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms != 0 && ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms != 0 && ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{}ms", ms)
    }
}

mod duration_format {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
