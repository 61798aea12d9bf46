//! # Auto Clicker
//!
//! A cross-platform auto-clicker engine: fires mouse clicks at a fixed
//! interval and target while staying responsive to start, stop and panic
//! signals from global hotkeys or a UI.
//!
//! ## Features
//!
//! - Left, right and double-left clicks, finite or continuous
//! - Targets: follow the cursor, a fixed point, the center of the screen
//!   under the cursor, or the center of the focused window
//! - Drift-free interval scheduling anchored to the nominal tick times
//! - Optional safety countdown before clicking starts
//! - Global hotkeys (F5 start, F6 stop, F8 pick, Escape panic by default)
//! - Live clicks-per-second and click counters
//! - JSON settings file support
//!
//! ## Example
//!
//! ```no_run
//! use auto_clicker::{ClickLimit, Point, RunConfig, SystemPlatform, TargetMode};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> auto_clicker::Result<()> {
//! let clicker = auto_clicker::spawn(Arc::new(SystemPlatform::new()));
//!
//! clicker.start(
//!     RunConfig::new(Duration::from_millis(100))
//!         .with_limit(ClickLimit::Finite(5))
//!         .with_target(TargetMode::FixedPoint(Point::new(100, 100))),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Settings can be provided via JSON files:
//!
//! ```json
//! {
//!   "interval": "100ms",
//!   "kind": "double-left",
//!   "count": 50,
//!   "countdown": "3s",
//!   "target": "screen-center",
//!   "hotkeys": { "panic": "ctrl+alt+q" }
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod platform;
pub mod reporter;
pub mod resolver;
pub mod scheduler;

pub use config::{ClickKind, ClickLimit, RunConfig, Settings, TargetKind, TargetMode};
pub use error::{ClickerError, ExecutionError, ResolutionError, Result, TickError};
pub use executor::{ClickEvent, ClickExecutor};
pub use gateway::{HotkeyBindings, HotkeyGateway, Signal, SignalRouter};
pub use platform::{MouseButton, Platform, Point, Rect, SystemPlatform};
pub use reporter::{Status, StatusReporter};
pub use resolver::TargetResolver;
pub use scheduler::{spawn, ClickerHandle, ControlMessage, RunEnd, RunState, SchedulerEvent};
