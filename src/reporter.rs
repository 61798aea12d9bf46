//! Status reporting: click counters and live clicks-per-second.
//!
//! The reporter sits strictly downstream of the scheduler. It reads the
//! lossy event broadcast and republishes a [`Status`] snapshot on a watch
//! channel, so nothing it does can hold up a tick.

use crate::scheduler::{RunEnd, RunState, SchedulerEvent};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Trailing window the live CPS figure is computed over.
pub const CPS_WINDOW: Duration = Duration::from_secs(1);

/// How often the snapshot is refreshed when no events arrive, so CPS decays
/// back to zero after clicking stops.
const REFRESH_PERIOD: Duration = Duration::from_millis(250);

/// Ticks per second an interval asks for, shown next to the measured rate.
pub fn nominal_cps(interval: Duration) -> f64 {
    1.0 / interval.as_secs_f64()
}

/// Counts click timestamps inside a trailing window.
#[derive(Debug, Clone)]
pub struct CpsMeter {
    window: Duration,
    clicks: VecDeque<Instant>,
}

impl Default for CpsMeter {
    fn default() -> Self {
        Self::new(CPS_WINDOW)
    }
}

impl CpsMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            clicks: VecDeque::new(),
        }
    }

    pub fn record(&mut self, at: Instant) {
        self.clicks.push_back(at);
    }

    /// Clicks per second over the window ending at `now`.
    pub fn rate(&mut self, now: Instant) -> f64 {
        while let Some(&oldest) = self.clicks.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.clicks.pop_front();
            } else {
                break;
            }
        }
        self.clicks.len() as f64 / self.window.as_secs_f64()
    }

    pub fn clear(&mut self) {
        self.clicks.clear();
    }
}

/// What the UI shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    pub state: RunState,
    /// Clicks in the current (or last) run.
    pub clicks_done: u64,
    pub current_cps: f64,
    /// Ticks that produced no click in the current run.
    pub missed_clicks: u64,
    pub last_warning: Option<String>,
    pub last_end: Option<RunEnd>,
}

/// Folds scheduler events into a [`Status`].
#[derive(Debug, Default)]
pub struct StatusReporter {
    meter: CpsMeter,
    status: Status,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &SchedulerEvent, now: Instant) {
        match event {
            SchedulerEvent::RunStarted(_) => {
                self.meter.clear();
                self.status = Status {
                    state: self.status.state,
                    ..Status::default()
                };
            }
            SchedulerEvent::State(state) => {
                self.status.state = *state;
                if let RunState::Running { clicks_done, .. } = state {
                    // Authoritative count; covers click events we missed.
                    self.status.clicks_done = self.status.clicks_done.max(*clicks_done);
                }
            }
            SchedulerEvent::Click(click) => {
                self.meter.record(click.timestamp);
                self.status.clicks_done += 1;
            }
            SchedulerEvent::TickSkipped(reason) => {
                self.status.missed_clicks += 1;
                self.status.last_warning = Some(reason.to_string());
            }
            SchedulerEvent::RunFinished { end, clicks } => {
                self.status.clicks_done = self.status.clicks_done.max(*clicks);
                self.status.last_end = Some(*end);
            }
        }
        self.refresh(now);
    }

    pub fn refresh(&mut self, now: Instant) {
        self.status.current_cps = self.meter.rate(now);
    }

    pub fn status(&self) -> &Status {
        &self.status
    }
}

/// Run a reporter task over `events`, returning the status feed.
pub fn spawn(mut events: broadcast::Receiver<SchedulerEvent>) -> watch::Receiver<Status> {
    let (tx, rx) = watch::channel(Status::default());

    tokio::spawn(async move {
        let mut reporter = StatusReporter::new();
        let mut refresh = time::interval(REFRESH_PERIOD);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => reporter.observe(&event, Instant::now()),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("status reporter dropped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = refresh.tick() => reporter.refresh(Instant::now()),
            }

            tx.send_if_modified(|current| {
                if current != reporter.status() {
                    *current = reporter.status().clone();
                    true
                } else {
                    false
                }
            });

            if tx.is_closed() {
                break;
            }
        }
        debug!("status reporter stopped");
    });

    rx
}
