//! Click execution: issues the synthetic clicks for one tick.

use crate::config::ClickKind;
use crate::error::ExecutionError;
use crate::platform::{MouseButton, Platform, Point};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::warn;

/// One physical click that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub timestamp: Instant,
    pub point: Point,
    pub kind: ClickKind,
}

/// Sends clicks through the platform and reports each one that landed.
pub struct ClickExecutor {
    platform: Arc<dyn Platform>,
}

impl ClickExecutor {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Click `kind` at `point`, never producing more than `budget` clicks.
    ///
    /// A double click is two left clicks and yields two events. When only one
    /// click of budget is left it degrades to a single left click. If the
    /// second half is rejected the first still counts.
    pub fn execute(
        &self,
        point: Point,
        kind: ClickKind,
        budget: Option<u64>,
    ) -> Result<Vec<ClickEvent>, ExecutionError> {
        let (button, presses) = match kind {
            ClickKind::Left => (MouseButton::Left, 1),
            ClickKind::Right => (MouseButton::Right, 1),
            ClickKind::DoubleLeft => (MouseButton::Left, 2),
        };
        let presses = budget.map_or(presses, |b| presses.min(b));

        let mut events = Vec::with_capacity(presses as usize);
        for _ in 0..presses {
            match self.platform.inject_click(point, button) {
                Ok(()) => events.push(ClickEvent {
                    timestamp: Instant::now(),
                    point,
                    kind,
                }),
                Err(e) if events.is_empty() => return Err(e),
                Err(e) => {
                    warn!("second click of double at {} rejected: {}", point, e);
                    break;
                }
            }
        }
        Ok(events)
    }
}
