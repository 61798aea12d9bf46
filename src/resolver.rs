//! Target resolution: turns a [`TargetMode`] into one screen coordinate.
//!
//! Nothing is cached between ticks. The cursor, displays and foreground
//! window can all change between two clicks, so every call goes back to the
//! platform. The only remembered value is the last cursor position seen,
//! used when a screen-center lookup cannot read the cursor right now.

use crate::config::TargetMode;
use crate::error::ResolutionError;
use crate::platform::{Platform, Point};
use std::sync::Arc;

/// Resolve `mode` against live platform state.
///
/// Every successful cursor read is stored in `last_cursor`. Only
/// [`TargetMode::ScreenCenter`] falls back to it, when the live query fails.
pub fn resolve_target(
    platform: &dyn Platform,
    mode: TargetMode,
    last_cursor: &mut Option<Point>,
) -> Result<Point, ResolutionError> {
    match mode {
        TargetMode::FollowCursor => {
            let cursor = platform.cursor_position()?;
            *last_cursor = Some(cursor);
            Ok(cursor)
        }
        TargetMode::FixedPoint(point) => Ok(point),
        TargetMode::ScreenCenter => {
            let cursor = match platform.cursor_position() {
                Ok(cursor) => {
                    *last_cursor = Some(cursor);
                    cursor
                }
                Err(e) => last_cursor.ok_or(e)?,
            };
            Ok(platform.display_containing(cursor)?.center())
        }
        TargetMode::ActiveWindowCenter => {
            if !platform.supports_active_window() {
                return Err(ResolutionError::Unsupported);
            }
            Ok(platform.active_window_rect()?.center())
        }
    }
}

/// Resolver owned by the scheduler task. Keeps the cursor history across runs.
pub struct TargetResolver {
    platform: Arc<dyn Platform>,
    last_cursor: Option<Point>,
}

impl TargetResolver {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            last_cursor: None,
        }
    }

    pub fn resolve(&mut self, mode: TargetMode) -> Result<Point, ResolutionError> {
        resolve_target(self.platform.as_ref(), mode, &mut self.last_cursor)
    }

    pub fn last_known_cursor(&self) -> Option<Point> {
        self.last_cursor
    }
}
