//! Platform capabilities the click engine needs.
//!
//! Everything that touches the real desktop goes through [`Platform`]: cursor
//! and geometry queries for target resolution, and synthetic click injection.
//! [`SystemPlatform`] is the production backend; tests plug in their own.

use crate::error::{ExecutionError, ResolutionError};
use enigo::MouseControllable;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// A point in global screen coordinates. May be negative on multi-monitor setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from left/top/right/bottom edges, as window APIs report them.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + (self.width / 2) as i32,
            y: self.y + (self.height / 2) as i32,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        let (px, py) = (i64::from(p.x), i64::from(p.y));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        px >= x && py >= y && px < x + i64::from(self.width) && py < y + i64::from(self.height)
    }
}

/// Physical mouse button pressed by one synthetic click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Desktop capabilities used by the resolver and executor.
///
/// Implementations are called from the scheduler task once or twice per
/// tick and must return quickly; they are never cancelled mid-call.
pub trait Platform: Send + Sync {
    /// Current global cursor position.
    fn cursor_position(&self) -> Result<Point, ResolutionError>;

    /// Bounds of the display that contains `at`.
    fn display_containing(&self, at: Point) -> Result<Rect, ResolutionError>;

    /// Bounds of the foreground window.
    fn active_window_rect(&self) -> Result<Rect, ResolutionError>;

    /// Whether [`Platform::active_window_rect`] can ever succeed here.
    fn supports_active_window(&self) -> bool;

    /// Move to `at` and issue one press+release of `button`.
    fn inject_click(&self, at: Point, button: MouseButton) -> Result<(), ExecutionError>;
}

thread_local! {
    static ENIGO: RefCell<enigo::Enigo> = RefCell::new(enigo::Enigo::new());
}

/// Real desktop backend: enigo for the cursor and clicks, display-info for
/// monitor geometry, and the Win32 foreground window on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPlatform;

impl SystemPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for SystemPlatform {
    fn cursor_position(&self) -> Result<Point, ResolutionError> {
        let (x, y) = ENIGO.with(|en| en.borrow().mouse_location());
        Ok(Point::new(x, y))
    }

    fn display_containing(&self, at: Point) -> Result<Rect, ResolutionError> {
        let display = display_info::DisplayInfo::from_point(at.x, at.y).map_err(|e| {
            tracing::debug!("display lookup for {} failed: {}", at, e);
            ResolutionError::NoDisplay { x: at.x, y: at.y }
        })?;
        Ok(Rect::new(display.x, display.y, display.width, display.height))
    }

    fn active_window_rect(&self) -> Result<Rect, ResolutionError> {
        foreground_window_rect()
    }

    fn supports_active_window(&self) -> bool {
        cfg!(windows)
    }

    fn inject_click(&self, at: Point, button: MouseButton) -> Result<(), ExecutionError> {
        let button = match button {
            MouseButton::Left => enigo::MouseButton::Left,
            MouseButton::Right => enigo::MouseButton::Right,
        };
        ENIGO.with(|en| {
            let mut en = en.borrow_mut();
            en.mouse_move_to(at.x, at.y);
            en.mouse_click(button);
        });
        Ok(())
    }
}

#[cfg(windows)]
fn foreground_window_rect() -> Result<Rect, ResolutionError> {
    use winapi::shared::windef::RECT;
    use winapi::um::winuser::{GetForegroundWindow, GetWindowRect};

    // SAFETY: GetForegroundWindow takes no arguments; GetWindowRect writes
    // into a RECT we own and is only called with a non-null handle.
    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.is_null() {
            return Err(ResolutionError::NoActiveWindow);
        }
        let mut rect: RECT = std::mem::zeroed();
        if GetWindowRect(hwnd, &mut rect) == 0 {
            return Err(ResolutionError::NoActiveWindow);
        }
        Ok(Rect::from_edges(rect.left, rect.top, rect.right, rect.bottom))
    }
}

#[cfg(not(windows))]
fn foreground_window_rect() -> Result<Rect, ResolutionError> {
    Err(ResolutionError::Unsupported)
}
