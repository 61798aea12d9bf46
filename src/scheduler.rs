//! Click scheduling: the run state machine and its control plane.
//!
//! A single [`Scheduler`] task owns [`RunState`]. Everything else talks to it
//! through one ordered channel of [`ControlMessage`]s, via a cloneable
//! [`ClickerHandle`], and watches what it does through [`SchedulerEvent`]s.
//!
//! The only places the task suspends are the countdown and the wait between
//! ticks. Both race the control channel, so Stop and Panic land at the next
//! checkpoint no matter how long the interval is.

use crate::config::RunConfig;
use crate::error::{ClickerError, Result, TickError};
use crate::executor::{ClickEvent, ClickExecutor};
use crate::platform::{Platform, Point};
use crate::reporter::{self, Status};
use crate::resolver::TargetResolver;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Buffered scheduler events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 1024;

/// Stand-in deadline for waits too long to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Commands accepted by the scheduler, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Begin a run. `None` reuses the most recently staged config.
    Start(Option<RunConfig>),
    Stop,
    Panic,
    /// Stage the config used by the next `Start(None)`.
    ConfigUpdate(RunConfig),
}

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    /// Whole seconds left before clicking starts.
    CountingDown { remaining: u32 },
    Running {
        clicks_done: u64,
        started_at: Instant,
    },
    Stopping,
}

impl RunState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunState::Idle)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::CountingDown { remaining } => write!(f, "starting in {}s", remaining),
            RunState::Running { clicks_done, .. } => write!(f, "running ({} clicks)", clicks_done),
            RunState::Stopping => write!(f, "stopping"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The click limit was reached.
    Completed,
    Stopped,
    Panicked,
}

/// What the scheduler publishes. Observers may miss some under load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    RunStarted(RunConfig),
    State(RunState),
    Click(ClickEvent),
    TickSkipped(TickError),
    RunFinished { end: RunEnd, clicks: u64 },
}

/// Owner of the run state machine. Drive it with [`Scheduler::run`].
pub struct Scheduler {
    inbox: mpsc::UnboundedReceiver<ControlMessage>,
    events: broadcast::Sender<SchedulerEvent>,
    resolver: TargetResolver,
    executor: ClickExecutor,
    staged: Option<RunConfig>,
    state: RunState,
    inbox_closed: bool,
}

impl Scheduler {
    pub fn new(
        platform: Arc<dyn Platform>,
        inbox: mpsc::UnboundedReceiver<ControlMessage>,
        events: broadcast::Sender<SchedulerEvent>,
    ) -> Self {
        Self {
            inbox,
            events,
            resolver: TargetResolver::new(platform.clone()),
            executor: ClickExecutor::new(platform),
            staged: None,
            state: RunState::Idle,
            inbox_closed: false,
        }
    }

    /// Process control messages until every sender is dropped.
    pub async fn run(mut self) {
        debug!("click scheduler started");
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                ControlMessage::Start(config) => {
                    if let Some(config) = config {
                        self.staged = Some(config);
                    }
                    match self.staged {
                        Some(config) => self.run_once(config).await,
                        None => warn!("start requested but no click configuration is set"),
                    }
                    if self.inbox_closed {
                        break;
                    }
                }
                ControlMessage::Stop | ControlMessage::Panic => {
                    debug!("{:?} while idle, nothing to do", msg);
                }
                ControlMessage::ConfigUpdate(config) => {
                    debug!("staged new click configuration: {:?}", config);
                    self.staged = Some(config);
                }
            }
        }
        debug!("click scheduler shut down");
    }

    async fn run_once(&mut self, config: RunConfig) {
        info!(
            "starting run: {:?} every {:?}, limit {:?}, target {:?}",
            config.kind, config.interval, config.limit, config.target
        );
        self.emit(SchedulerEvent::RunStarted(config));

        let (end, clicks) = match self.count_down(config.countdown).await {
            Some(end) => (end, 0),
            None => self.click_loop(&config).await,
        };

        if end != RunEnd::Completed && matches!(self.state, RunState::Running { .. }) {
            self.set_state(RunState::Stopping);
        }
        self.set_state(RunState::Idle);

        match end {
            RunEnd::Completed => info!("run completed after {} clicks", clicks),
            RunEnd::Stopped => info!("run stopped after {} clicks", clicks),
            RunEnd::Panicked => warn!("panic stop after {} clicks", clicks),
        }
        self.emit(SchedulerEvent::RunFinished { end, clicks });
    }

    /// Returns `Some` if the run was cancelled before clicking began.
    async fn count_down(&mut self, countdown: Duration) -> Option<RunEnd> {
        if countdown.is_zero() {
            return None;
        }

        let deadline = deadline_after(Instant::now(), countdown);
        loop {
            if let Some(end) = self.poll_control() {
                return Some(end);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let left = deadline - now;
            let remaining = u32::try_from(left.as_nanos().div_ceil(1_000_000_000))
                .unwrap_or(u32::MAX);
            if self.state != (RunState::CountingDown { remaining }) {
                info!("starting in {}s", remaining);
                self.set_state(RunState::CountingDown { remaining });
            }

            // Wake when the displayed second rolls over.
            let until_next = left.saturating_sub(Duration::from_secs(u64::from(remaining - 1)));
            if let Some(end) = self.wait_until(now + until_next).await {
                return Some(end);
            }
        }
    }

    async fn click_loop(&mut self, config: &RunConfig) -> (RunEnd, u64) {
        let started_at = Instant::now();
        let mut clicks_done = 0;
        self.set_state(RunState::Running {
            clicks_done,
            started_at,
        });

        // Ticks are anchored to the nominal schedule so per-tick work does not
        // accumulate into drift.
        let mut next_tick = started_at;
        loop {
            if let Some(end) = self.poll_control() {
                return (end, clicks_done);
            }

            clicks_done += self.tick(config, clicks_done);
            self.set_state(RunState::Running {
                clicks_done,
                started_at,
            });

            next_tick = deadline_after(next_tick, config.interval);
            let now = Instant::now();
            if next_tick < now {
                debug!("tick overran its slot by {:?}", now - next_tick);
                next_tick = now;
            }

            // Every click owns a full slot, the last one included.
            if let Some(end) = self.wait_until(next_tick).await {
                return (end, clicks_done);
            }
            if config.limit.is_reached(clicks_done) {
                return (RunEnd::Completed, clicks_done);
            }
        }
    }

    /// Resolve, click and publish. Returns how many clicks landed.
    fn tick(&mut self, config: &RunConfig, clicks_done: u64) -> u64 {
        let point = match self.resolver.resolve(config.target) {
            Ok(point) => point,
            Err(e) => {
                warn!("skipping tick: {}", e);
                self.emit(SchedulerEvent::TickSkipped(e.into()));
                return 0;
            }
        };

        let budget = config.limit.remaining(clicks_done);
        match self.executor.execute(point, config.kind, budget) {
            Ok(clicks) => {
                let landed = clicks.len() as u64;
                for click in clicks {
                    debug!("clicked {:?} at {}", click.kind, click.point);
                    self.emit(SchedulerEvent::Click(click));
                }
                landed
            }
            Err(e) => {
                warn!("missed click: {}", e);
                self.emit(SchedulerEvent::TickSkipped(e.into()));
                0
            }
        }
    }

    /// Sleep until `deadline`, serving control messages meanwhile.
    async fn wait_until(&mut self, deadline: Instant) -> Option<RunEnd> {
        loop {
            tokio::select! {
                biased;
                msg = self.inbox.recv() => {
                    if let Some(end) = self.handle_during_run(msg) {
                        return Some(end);
                    }
                }
                _ = time::sleep_until(deadline) => return None,
            }
        }
    }

    /// Drain already-queued control messages without waiting.
    fn poll_control(&mut self) -> Option<RunEnd> {
        loop {
            match self.inbox.try_recv() {
                Ok(msg) => {
                    if let Some(end) = self.handle_during_run(Some(msg)) {
                        return Some(end);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return self.handle_during_run(None),
            }
        }
    }

    fn handle_during_run(&mut self, msg: Option<ControlMessage>) -> Option<RunEnd> {
        match msg {
            Some(ControlMessage::Stop) => Some(RunEnd::Stopped),
            Some(ControlMessage::Panic) => Some(RunEnd::Panicked),
            Some(ControlMessage::Start(_)) => {
                debug!("start ignored, a run is already in progress");
                None
            }
            Some(ControlMessage::ConfigUpdate(config)) => {
                debug!("staged click configuration for the next run");
                self.staged = Some(config);
                None
            }
            None => {
                warn!("control channel closed, stopping run");
                self.inbox_closed = true;
                Some(RunEnd::Stopped)
            }
        }
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.emit(SchedulerEvent::State(state));
    }

    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine; observation is optional.
        let _ = self.events.send(event);
    }
}

/// `base + offset`, or a deadline decades away when that is not representable.
fn deadline_after(base: Instant, offset: Duration) -> Instant {
    base.checked_add(offset)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Cloneable front door to a running scheduler.
///
/// Commands are validated here, synchronously, so a bad config is rejected
/// before the scheduler ever sees it.
#[derive(Clone)]
pub struct ClickerHandle {
    control: mpsc::UnboundedSender<ControlMessage>,
    events: broadcast::Sender<SchedulerEvent>,
    status: watch::Receiver<Status>,
    platform: Arc<dyn Platform>,
}

impl ClickerHandle {
    pub fn start(&self, config: RunConfig) -> Result<()> {
        config.validate()?;
        config.check_supported(self.platform.as_ref())?;
        self.send(ControlMessage::Start(Some(config)))
    }

    /// Start with the last config passed to [`start`](Self::start) or
    /// [`configure`](Self::configure).
    pub fn start_staged(&self) -> Result<()> {
        self.send(ControlMessage::Start(None))
    }

    pub fn configure(&self, config: RunConfig) -> Result<()> {
        config.validate()?;
        config.check_supported(self.platform.as_ref())?;
        self.send(ControlMessage::ConfigUpdate(config))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(ControlMessage::Stop)
    }

    pub fn panic(&self) -> Result<()> {
        self.send(ControlMessage::Panic)
    }

    /// Read the live cursor position. Does not touch the scheduler.
    pub fn pick_current_position(&self) -> Result<Point> {
        Ok(self.platform.cursor_position()?)
    }

    pub fn status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    fn send(&self, msg: ControlMessage) -> Result<()> {
        self.control
            .send(msg)
            .map_err(|_| ClickerError::SchedulerClosed)
    }
}

/// Spawn the scheduler and status reporter on the current tokio runtime.
pub fn spawn(platform: Arc<dyn Platform>) -> ClickerHandle {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);

    let status = reporter::spawn(events_rx);
    let scheduler = Scheduler::new(platform.clone(), control_rx, events_tx.clone());
    tokio::spawn(scheduler.run());

    ClickerHandle {
        control: control_tx,
        events: events_tx,
        status,
        platform,
    }
}
