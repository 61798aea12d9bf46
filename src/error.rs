//! Custom error types for auto-clicker.
//!
//! `ClickerError` covers everything that can reject a command outright.
//! `ResolutionError` and `ExecutionError` describe a single failed tick; the
//! scheduler reports them and keeps going, so they are kept small and
//! cloneable to travel inside scheduler events.

use std::io;
use thiserror::Error;

/// Main error type for auto-clicker operations.
#[derive(Error, Debug)]
pub enum ClickerError {
    /// Run configuration failed validation.
    #[error("configuration error: {0}")]
    ConfigValidation(String),

    /// The requested targeting mode needs a capability this platform lacks.
    #[error("target mode '{mode}' is not supported on this platform")]
    UnsupportedTarget { mode: String },

    /// Error parsing duration string.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// Error reading or parsing settings file.
    #[error("failed to load settings from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Error writing settings file.
    #[error("failed to save settings to '{path}': {reason}")]
    ConfigSave { path: String, reason: String },

    /// Error registering or listening for hotkeys.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// A hotkey chord could not be parsed.
    #[error("invalid hotkey '{hotkey}': {reason}")]
    InvalidHotkey { hotkey: String, reason: String },

    /// The scheduler task is gone and can no longer take commands.
    #[error("click scheduler is not running")]
    SchedulerClosed,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for auto-clicker operations.
pub type Result<T> = std::result::Result<T, ClickerError>;

/// Why a click target could not be determined for one tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("cursor position unavailable: {0}")]
    CursorUnavailable(String),

    #[error("no display contains point ({x}, {y})")]
    NoDisplay { x: i32, y: i32 },

    #[error("active window query is not supported on this platform")]
    Unsupported,

    #[error("no window is focused")]
    NoActiveWindow,
}

/// A synthetic click was refused by the platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("click at ({x}, {y}) rejected: {reason}")]
    Rejected { x: i32, y: i32, reason: String },
}

/// Reason a tick produced no click.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TickError {
    #[error("could not resolve target: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("click failed: {0}")]
    Execution(#[from] ExecutionError),
}

impl ClickerError {
    /// Create a new ConfigValidation error.
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation(message.into())
    }

    /// Create a new UnsupportedTarget error.
    pub fn unsupported_target(mode: impl Into<String>) -> Self {
        Self::UnsupportedTarget { mode: mode.into() }
    }

    /// Create a new InvalidDuration error.
    pub fn invalid_duration(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ConfigLoad error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ConfigSave error.
    pub fn config_save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigSave {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Hotkey error.
    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }

    /// Create a new InvalidHotkey error.
    pub fn invalid_hotkey(hotkey: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHotkey {
            hotkey: hotkey.into(),
            reason: reason.into(),
        }
    }
}

impl ExecutionError {
    pub fn rejected(x: i32, y: i32, reason: impl Into<String>) -> Self {
        Self::Rejected {
            x,
            y,
            reason: reason.into(),
        }
    }
}
