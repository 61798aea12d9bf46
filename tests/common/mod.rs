#![allow(dead_code)]

use auto_clicker::{
    ClickEvent, ExecutionError, MouseButton, Platform, Point, Rect, ResolutionError, RunEnd,
    SchedulerEvent, TickError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

/// Scriptable desktop: one 1920x1080 display, a movable cursor, an optional
/// focused window, and a log of every injected click.
pub struct MockPlatform {
    cursor: Mutex<Point>,
    window: Mutex<Result<Rect, ResolutionError>>,
    supports_window: bool,
    reject_clicks: AtomicBool,
    click_latency: Duration,
    clicks: Mutex<Vec<(Point, MouseButton)>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            cursor: Mutex::new(Point::new(500, 400)),
            window: Mutex::new(Ok(Rect::new(100, 100, 600, 400))),
            supports_window: true,
            reject_clicks: AtomicBool::new(false),
            click_latency: Duration::ZERO,
            clicks: Mutex::new(Vec::new()),
        }
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_window_support() -> Self {
        Self {
            supports_window: false,
            ..Self::default()
        }
    }

    /// Every click blocks the calling thread for `latency`.
    pub fn with_click_latency(latency: Duration) -> Self {
        Self {
            click_latency: latency,
            ..Self::default()
        }
    }

    pub fn move_cursor(&self, to: Point) {
        *self.cursor.lock().unwrap() = to;
    }

    pub fn set_window(&self, window: Result<Rect, ResolutionError>) {
        *self.window.lock().unwrap() = window;
    }

    pub fn reject_clicks(&self, reject: bool) {
        self.reject_clicks.store(reject, Ordering::SeqCst);
    }

    pub fn clicks(&self) -> Vec<(Point, MouseButton)> {
        self.clicks.lock().unwrap().clone()
    }
}

impl Platform for MockPlatform {
    fn cursor_position(&self) -> Result<Point, ResolutionError> {
        Ok(*self.cursor.lock().unwrap())
    }

    fn display_containing(&self, at: Point) -> Result<Rect, ResolutionError> {
        let display = Rect::new(0, 0, 1920, 1080);
        if display.contains(at) {
            Ok(display)
        } else {
            Err(ResolutionError::NoDisplay { x: at.x, y: at.y })
        }
    }

    fn active_window_rect(&self) -> Result<Rect, ResolutionError> {
        self.window.lock().unwrap().clone()
    }

    fn supports_active_window(&self) -> bool {
        self.supports_window
    }

    fn inject_click(&self, at: Point, button: MouseButton) -> Result<(), ExecutionError> {
        if !self.click_latency.is_zero() {
            std::thread::sleep(self.click_latency);
        }
        if self.reject_clicks.load(Ordering::SeqCst) {
            return Err(ExecutionError::rejected(at.x, at.y, "synthetic input blocked"));
        }
        self.clicks.lock().unwrap().push((at, button));
        Ok(())
    }
}

/// Everything observed during one run.
#[derive(Debug, Default)]
pub struct RunLog {
    pub clicks: Vec<ClickEvent>,
    pub skipped: Vec<TickError>,
    pub end: Option<RunEnd>,
    pub reported_clicks: u64,
}

/// Read events until the current run finishes.
pub async fn collect_run(events: &mut broadcast::Receiver<SchedulerEvent>) -> RunLog {
    let mut log = RunLog::default();
    loop {
        match events.recv().await.expect("scheduler event stream closed") {
            SchedulerEvent::Click(click) => log.clicks.push(click),
            SchedulerEvent::TickSkipped(reason) => log.skipped.push(reason),
            SchedulerEvent::RunFinished { end, clicks } => {
                log.end = Some(end);
                log.reported_clicks = clicks;
                return log;
            }
            _ => {}
        }
    }
}

/// Drain whatever is already buffered without waiting.
pub fn drain(events: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
